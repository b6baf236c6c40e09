//! # JSON <-> DynamicMessage Codec
//!
//! Schema-driven conversion between JSON text and [`DynamicMessage`].
//!
//! ## Decoding (JSON -> message)
//!
//! * Keys are matched to fields by their declared name; the lowerCamel JSON name is accepted too.
//! * Unknown keys are ignored and `null` leaves a field unset.
//! * Zero values are not stored for fields without presence, nor for a oneof member that comes
//!   with one of its siblings. Encoded output therefore decodes back to the same message.
//! * Enums accept a symbol or a number, 64-bit integers accept numbers or decimal strings and
//!   bytes accept base64.
//!
//! ## Encoding (message -> JSON)
//!
//! * Every declared field is written, in declaration order, using its declared name. Unset fields
//!   are written with their zero value; unset message fields are written as `null`.
//! * Enums are written as the first symbol declared for their number, or as the bare number when
//!   no symbol matches.
//! * Map entries are sorted by key.
//!
//! Well-known types (`google.protobuf.*`) follow the Protobuf JSON mapping, see [`well_known`].
mod well_known;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use prost_reflect::{
    DescriptorPool, DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MapKey,
    MessageDescriptor, ReflectMessage, Value,
};
use serde_json::{Map, Number, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::HashMap;
use well_known::WellKnownType;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed JSON input: {0}")]
    MalformedInput(#[source] serde_json::Error),

    #[error("Expected a JSON object for message '{message}', found {found}")]
    NotAnObject {
        message: String,
        found: &'static str,
    },

    #[error("Unknown symbol '{symbol}' for enum '{enum_name}'")]
    UnknownEnumSymbol { enum_name: String, symbol: String },

    #[error("Invalid value for field '{field}': expected {expected}, found {found}")]
    InvalidFieldValue {
        field: String,
        expected: &'static str,
        found: String,
    },
}

impl CodecError {
    fn invalid(field: &FieldDescriptor, expected: &'static str, found: &JsonValue) -> Self {
        Self::InvalidFieldValue {
            field: field.full_name().to_string(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Converts between JSON and [`DynamicMessage`] for the messages of one descriptor pool.
///
/// The pool is used to resolve the payload types of `google.protobuf.Any` values. Types that
/// cannot be resolved there are looked up in the pool of the `Any` field itself.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    pool: DescriptorPool,
}

impl MessageCodec {
    pub fn new(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    /// Parses `input` as JSON and builds a message of type `desc` from it.
    pub fn decode(
        &self,
        desc: &MessageDescriptor,
        input: &[u8],
    ) -> Result<DynamicMessage, CodecError> {
        let value: JsonValue = serde_json::from_slice(input).map_err(CodecError::MalformedInput)?;
        self.decode_value(desc, value)
    }

    /// Builds a message of type `desc` from an already parsed JSON value.
    pub fn decode_value(
        &self,
        desc: &MessageDescriptor,
        value: JsonValue,
    ) -> Result<DynamicMessage, CodecError> {
        if let Some(wkt) = WellKnownType::of(desc) {
            return self.decode_well_known(wkt, desc, value);
        }

        let JsonValue::Object(object) = value else {
            return Err(CodecError::NotAnObject {
                message: desc.full_name().to_string(),
                found: json_type(&value),
            });
        };

        let mut fields = Vec::with_capacity(object.len());

        for (key, value) in object {
            let Some(field) = desc
                .get_field_by_name(&key)
                .or_else(|| desc.get_field_by_json_name(&key))
            else {
                tracing::debug!(message = desc.full_name(), key, "ignoring unknown field");
                continue;
            };

            if value.is_null() && !accepts_null(&field.kind()) {
                continue;
            }

            let decoded = self.decode_field(&field, value)?;
            fields.push((field, decoded));
        }

        let mut message = DynamicMessage::new(desc.clone());

        for (field, value) in &fields {
            if value.is_default_for_field(field)
                && (!field.supports_presence() || has_oneof_sibling(field, &fields))
            {
                continue;
            }

            set_field(&mut message, field, value.clone())?;
        }

        Ok(message)
    }

    /// Encodes `message` as a JSON value.
    pub fn encode(&self, message: &DynamicMessage) -> JsonValue {
        match WellKnownType::of(&message.descriptor()) {
            Some(wkt) => self.encode_well_known(wkt, message),
            None => self.encode_fields(message),
        }
    }

    fn encode_fields(&self, message: &DynamicMessage) -> JsonValue {
        let object = message
            .descriptor()
            .fields()
            .map(|field| {
                let value = self.encode_field(message, &field);
                (field.name().to_string(), value)
            })
            .collect::<Map<_, _>>();

        JsonValue::Object(object)
    }

    /// Encodes `message` as compact JSON text.
    pub fn encode_to_string(&self, message: &DynamicMessage) -> String {
        self.encode(message).to_string()
    }

    fn decode_field(&self, field: &FieldDescriptor, value: JsonValue) -> Result<Value, CodecError> {
        if field.is_map() {
            self.decode_map(field, value)
        } else if field.is_list() {
            let JsonValue::Array(items) = value else {
                return Err(CodecError::invalid(field, "an array", &value));
            };

            let kind = field.kind();
            let items = items
                .into_iter()
                .map(|item| self.decode_single(field, &kind, item))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Value::List(items))
        } else {
            self.decode_single(field, &field.kind(), value)
        }
    }

    fn decode_map(&self, field: &FieldDescriptor, value: JsonValue) -> Result<Value, CodecError> {
        let Kind::Message(entry) = field.kind() else {
            return Err(CodecError::invalid(field, "a map entry type", &value));
        };

        let JsonValue::Object(object) = value else {
            return Err(CodecError::invalid(field, "an object", &value));
        };

        let key_kind = entry.map_entry_key_field().kind();
        let value_field = entry.map_entry_value_field();
        let value_kind = value_field.kind();

        let mut map = HashMap::with_capacity(object.len());

        for (key, value) in object {
            let key = decode_map_key(field, &key_kind, &key)?;
            let value = if value.is_null() && !accepts_null(&value_kind) {
                Value::default_value_for_field(&value_field)
            } else {
                self.decode_single(&value_field, &value_kind, value)?
            };

            map.insert(key, value);
        }

        Ok(Value::Map(map))
    }

    fn decode_single(
        &self,
        field: &FieldDescriptor,
        kind: &Kind,
        value: JsonValue,
    ) -> Result<Value, CodecError> {
        let decoded = match kind {
            Kind::Double => Value::F64(decode_float(field, &value)?),
            Kind::Float => Value::F32(decode_float(field, &value)? as f32),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
                Value::I32(decode_integer(field, &value)?)
            }
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
                Value::I64(decode_integer(field, &value)?)
            }
            Kind::Uint32 | Kind::Fixed32 => Value::U32(decode_integer(field, &value)?),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(decode_integer(field, &value)?),
            Kind::Bool => match value {
                JsonValue::Bool(b) => Value::Bool(b),
                other => return Err(CodecError::invalid(field, "a boolean", &other)),
            },
            Kind::String => match value {
                JsonValue::String(s) => Value::String(s),
                other => return Err(CodecError::invalid(field, "a string", &other)),
            },
            Kind::Bytes => Value::Bytes(decode_bytes(field, &value)?.into()),
            Kind::Enum(enum_desc) => Value::EnumNumber(decode_enum(field, enum_desc, &value)?),
            Kind::Message(message_desc) => {
                Value::Message(self.decode_value(message_desc, value)?)
            }
        };

        Ok(decoded)
    }

    fn encode_field(&self, message: &DynamicMessage, field: &FieldDescriptor) -> JsonValue {
        let kind = field.kind();
        let value = message.get_field(field);

        if field.is_map() {
            let Kind::Message(entry) = &kind else {
                return JsonValue::Null;
            };
            let value_kind = entry.map_entry_value_field().kind();

            return match value.as_map() {
                Some(map) => self.encode_map(map, &value_kind),
                None => JsonValue::Object(Map::new()),
            };
        }

        if field.is_list() {
            let items = value
                .as_list()
                .unwrap_or_default()
                .iter()
                .map(|item| self.encode_single(&kind, item))
                .collect();

            return JsonValue::Array(items);
        }

        if matches!(kind, Kind::Message(_)) && !message.has_field(field) {
            return JsonValue::Null;
        }

        self.encode_single(&kind, &value)
    }

    fn encode_map(&self, map: &HashMap<MapKey, Value>, value_kind: &Kind) -> JsonValue {
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by(|(a, _), (b, _)| compare_map_keys(a, b));

        let object = entries
            .into_iter()
            .map(|(key, value)| (map_key_string(key), self.encode_single(value_kind, value)))
            .collect::<Map<_, _>>();

        JsonValue::Object(object)
    }

    fn encode_single(&self, kind: &Kind, value: &Value) -> JsonValue {
        match value {
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::I32(n) => JsonValue::from(*n),
            Value::I64(n) => JsonValue::from(*n),
            Value::U32(n) => JsonValue::from(*n),
            Value::U64(n) => JsonValue::from(*n),
            Value::F32(n) => encode_f32(*n),
            Value::F64(n) => encode_f64(*n),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
            Value::EnumNumber(number) => match kind {
                Kind::Enum(enum_desc) => encode_enum(enum_desc, *number),
                _ => JsonValue::from(*number),
            },
            Value::Message(message) => self.encode(message),
            Value::List(items) => items
                .iter()
                .map(|item| self.encode_single(kind, item))
                .collect(),
            Value::Map(map) => match kind {
                Kind::Message(entry) => {
                    self.encode_map(map, &entry.map_entry_value_field().kind())
                }
                _ => JsonValue::Null,
            },
        }
    }
}

/// Encoding writes every oneof member, so a zero valued member that arrives next to its siblings
/// is not taken as the active one.
fn has_oneof_sibling(field: &FieldDescriptor, fields: &[(FieldDescriptor, Value)]) -> bool {
    let Some(oneof) = field.containing_oneof() else {
        return false;
    };

    fields
        .iter()
        .any(|(other, _)| other != field && other.containing_oneof().as_ref() == Some(&oneof))
}

fn set_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    value: Value,
) -> Result<(), CodecError> {
    message
        .try_set_field(field, value)
        .map_err(|err| CodecError::InvalidFieldValue {
            field: field.full_name().to_string(),
            expected: "a value matching the field type",
            found: err.to_string(),
        })
}

/// `google.protobuf.Value` and `google.protobuf.NullValue` give JSON `null` a meaning.
fn accepts_null(kind: &Kind) -> bool {
    match kind {
        Kind::Message(desc) => desc.full_name() == "google.protobuf.Value",
        Kind::Enum(desc) => desc.full_name() == well_known::NULL_VALUE,
        _ => false,
    }
}

fn decode_integer<T>(field: &FieldDescriptor, value: &JsonValue) -> Result<T, CodecError>
where
    T: TryFrom<i64> + TryFrom<u64> + std::str::FromStr,
{
    let parsed = match value {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                <T as TryFrom<i64>>::try_from(i).ok()
            } else if let Some(u) = n.as_u64() {
                <T as TryFrom<u64>>::try_from(u).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .and_then(|f| <T as TryFrom<i64>>::try_from(f as i64).ok())
            }
        }
        JsonValue::String(s) => s.trim().parse::<T>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| CodecError::invalid(field, "an integer in range", value))
}

fn decode_float(field: &FieldDescriptor, value: &JsonValue) -> Result<f64, CodecError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.trim().parse::<f64>().ok(),
        },
        _ => None,
    };

    parsed.ok_or_else(|| CodecError::invalid(field, "a number", value))
}

fn decode_bytes(field: &FieldDescriptor, value: &JsonValue) -> Result<Vec<u8>, CodecError> {
    let JsonValue::String(s) = value else {
        return Err(CodecError::invalid(field, "a base64 string", value));
    };

    STANDARD
        .decode(s)
        .or_else(|_| URL_SAFE.decode(s))
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(s))
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s))
        .map_err(|_| CodecError::invalid(field, "a base64 string", value))
}

fn decode_enum(
    field: &FieldDescriptor,
    enum_desc: &EnumDescriptor,
    value: &JsonValue,
) -> Result<i32, CodecError> {
    match value {
        JsonValue::Null if enum_desc.full_name() == well_known::NULL_VALUE => Ok(0),
        JsonValue::String(symbol) => match enum_desc.get_value_by_name(symbol) {
            Some(v) => Ok(v.number()),
            None => symbol
                .trim()
                .parse::<i32>()
                .map_err(|_| CodecError::UnknownEnumSymbol {
                    enum_name: enum_desc.full_name().to_string(),
                    symbol: symbol.clone(),
                }),
        },
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| CodecError::invalid(field, "an enum number", value)),
        other => Err(CodecError::invalid(field, "an enum symbol or number", other)),
    }
}

fn decode_map_key(field: &FieldDescriptor, kind: &Kind, key: &str) -> Result<MapKey, CodecError> {
    let invalid = || CodecError::invalid(field, "a valid map key", &JsonValue::from(key));

    let decoded = match kind {
        Kind::String => MapKey::String(key.to_string()),
        Kind::Bool => match key {
            "true" => MapKey::Bool(true),
            "false" => MapKey::Bool(false),
            _ => return Err(invalid()),
        },
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            MapKey::I32(key.parse().map_err(|_| invalid())?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            MapKey::I64(key.parse().map_err(|_| invalid())?)
        }
        Kind::Uint32 | Kind::Fixed32 => MapKey::U32(key.parse().map_err(|_| invalid())?),
        Kind::Uint64 | Kind::Fixed64 => MapKey::U64(key.parse().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };

    Ok(decoded)
}

fn encode_enum(enum_desc: &EnumDescriptor, number: i32) -> JsonValue {
    if enum_desc.full_name() == well_known::NULL_VALUE {
        return JsonValue::Null;
    }

    // Aliases share a number; the first declared symbol wins.
    match enum_desc.values().find(|v| v.number() == number) {
        Some(v) => JsonValue::String(v.name().to_string()),
        None => JsonValue::from(number),
    }
}

fn encode_f32(value: f32) -> JsonValue {
    if !value.is_finite() {
        return encode_f64(f64::from(value));
    }

    // Go through the shortest decimal form of the f32 so 1.1f32 prints as 1.1.
    let widened = value.to_string().parse::<f64>().unwrap_or(f64::from(value));
    encode_f64(widened)
}

fn encode_f64(value: f64) -> JsonValue {
    if value.is_nan() {
        return JsonValue::String("NaN".to_string());
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return JsonValue::String(text.to_string());
    }

    if value.fract() == 0.0 && value.abs() < 1e15 {
        return JsonValue::from(value as i64);
    }

    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn map_key_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(n) => n.to_string(),
        MapKey::I64(n) => n.to_string(),
        MapKey::U32(n) => n.to_string(),
        MapKey::U64(n) => n.to_string(),
        MapKey::String(s) => s.clone(),
    }
}

fn compare_map_keys(a: &MapKey, b: &MapKey) -> Ordering {
    match (a, b) {
        (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
        (MapKey::I32(a), MapKey::I32(b)) => a.cmp(b),
        (MapKey::I64(a), MapKey::I64(b)) => a.cmp(b),
        (MapKey::U32(a), MapKey::U32(b)) => a.cmp(b),
        (MapKey::U64(a), MapKey::U64(b)) => a.cmp(b),
        (MapKey::String(a), MapKey::String(b)) => a.cmp(b),
        (a, b) => map_key_string(a).cmp(&map_key_string(b)),
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> MessageCodec {
        let pool = DescriptorPool::decode(test_service::FILE_DESCRIPTOR_SET).unwrap();
        MessageCodec::new(pool)
    }

    fn message(codec: &MessageCodec, name: &str) -> MessageDescriptor {
        codec.pool.get_message_by_name(name).unwrap()
    }

    fn transcode(name: &str, input: &str) -> String {
        let codec = codec();
        let desc = message(&codec, name);
        let decoded = codec.decode(&desc, input.as_bytes()).unwrap();
        codec.encode_to_string(&decoded)
    }

    #[test]
    fn fills_defaults() {
        assert_eq!(
            transcode("grpcurl.test.EchoMessage", "{}"),
            r#"{"value":"","error_code":0}"#
        );
    }

    #[test]
    fn ignores_unknown_fields() {
        assert_eq!(
            transcode("grpcurl.test.EchoMessage", r#"{"xxx":"vvvv"}"#),
            r#"{"value":"","error_code":0}"#
        );
    }

    #[test]
    fn null_leaves_field_unset() {
        assert_eq!(
            transcode(
                "grpcurl.test.EchoMessage",
                r#"{"value":null,"error_code":3}"#
            ),
            r#"{"value":"","error_code":3}"#
        );
    }

    #[test]
    fn accepts_json_names() {
        assert_eq!(
            transcode("grpcurl.test.EchoMessage", r#"{"errorCode":7}"#),
            r#"{"value":"","error_code":7}"#
        );
    }

    #[test]
    fn numbers() {
        let input = r#"{"float_value":1.1,"double_value":2.2,"int32_value":3,"int64_value":"4","uint32_value":5,"uint64_value":6,"sint32_value":7,"sint64_value":8,"fixed32_value":9,"fixed64_value":10,"sfixed32_value":11,"sfixed64_value":12}"#;
        let expected = r#"{"float_value":1.1,"double_value":2.2,"int32_value":3,"int64_value":4,"uint32_value":5,"uint64_value":6,"sint32_value":7,"sint64_value":8,"fixed32_value":9,"fixed64_value":10,"sfixed32_value":11,"sfixed64_value":12}"#;

        assert_eq!(transcode("grpcurl.test.NumberMessage", input), expected);
    }

    #[test]
    fn large_64_bit_integers_are_exact() {
        let output = transcode(
            "grpcurl.test.NumberMessage",
            r#"{"int64_value":"-9223372036854775808","uint64_value":18446744073709551615}"#,
        );
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(value["int64_value"], json!(i64::MIN));
        assert_eq!(value["uint64_value"], json!(u64::MAX));
    }

    #[test]
    fn non_finite_floats() {
        let output = transcode(
            "grpcurl.test.NumberMessage",
            r#"{"float_value":"NaN","double_value":"-Infinity"}"#,
        );
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(value["float_value"], json!("NaN"));
        assert_eq!(value["double_value"], json!("-Infinity"));
    }

    #[test]
    fn enums_by_symbol_and_number() {
        let expected = r#"{"numeric_enum_value":"ONE","repeated_numeric_enum_values":["ONE","TWO"],"aliased_enum_value":"STARTED","nested_enum_value":"PENDING","repeated_nested_enum_values":["PENDING","COMPLETED"]}"#;

        let by_symbol = r#"{"numeric_enum_value":"ONE","repeated_numeric_enum_values":["ONE","TWO"],"aliased_enum_value":"RUNNING","nested_enum_value":"PENDING","repeated_nested_enum_values":["PENDING","COMPLETED"]}"#;
        let by_number = r#"{"numeric_enum_value":1,"repeated_numeric_enum_values":[1,2],"aliased_enum_value":1,"nested_enum_value":1,"repeated_nested_enum_values":[1,2]}"#;

        assert_eq!(transcode("grpcurl.test.EnumMessage", by_symbol), expected);
        assert_eq!(transcode("grpcurl.test.EnumMessage", by_number), expected);
    }

    #[test]
    fn unknown_enum_numbers_are_kept() {
        assert_eq!(
            transcode(
                "grpcurl.test.EnumMessage",
                r#"{"numeric_enum_value":42}"#
            ),
            r#"{"numeric_enum_value":42,"repeated_numeric_enum_values":[],"aliased_enum_value":"UNKNOWN","nested_enum_value":"UNKNOWN","repeated_nested_enum_values":[]}"#
        );
    }

    #[test]
    fn unknown_enum_symbol_is_an_error() {
        let codec = codec();
        let desc = message(&codec, "grpcurl.test.EnumMessage");

        let result = codec.decode(&desc, br#"{"numeric_enum_value":"THREE"}"#);

        assert!(matches!(
            result,
            Err(CodecError::UnknownEnumSymbol { enum_name, symbol })
                if enum_name == "grpcurl.test.NumericEnum" && symbol == "THREE"
        ));
    }

    #[test]
    fn oneof_members() {
        assert_eq!(
            transcode("grpcurl.test.OneofMessage", r#"{"int32_value":100}"#),
            r#"{"int32_value":100,"string_value":"","repeated_oneof_values":[]}"#
        );
        assert_eq!(
            transcode(
                "grpcurl.test.OneofMessage",
                r#"{"int32_value":100,"string_value":"xxx"}"#
            ),
            r#"{"int32_value":0,"string_value":"xxx","repeated_oneof_values":[]}"#
        );
    }

    #[test]
    fn oneof_round_trip_keeps_the_active_member() {
        let codec = codec();
        let desc = message(&codec, "grpcurl.test.OneofMessage");

        for input in [
            r#"{"int32_value":100}"#,
            r#"{"string_value":"xxx"}"#,
            r#"{"repeated_oneof_values":[{"int32_value":7},{}]}"#,
        ] {
            let decoded = codec.decode(&desc, input.as_bytes()).unwrap();
            let encoded = codec.encode_to_string(&decoded);
            let redecoded = codec.decode(&desc, encoded.as_bytes()).unwrap();

            assert_eq!(redecoded, decoded, "{input} was encoded as {encoded}");
        }
    }

    #[test]
    fn recursive_messages_follow_values() {
        assert_eq!(
            transcode(
                "grpcurl.test.OneofMessage",
                r#"{"repeated_oneof_values":[{"string_value":"inner"}]}"#
            ),
            r#"{"int32_value":0,"string_value":"","repeated_oneof_values":[{"int32_value":0,"string_value":"inner","repeated_oneof_values":[]}]}"#
        );
    }

    #[test]
    fn maps_are_sorted_by_key() {
        let input = r#"{"mapped_value":{"foo":"foo1","bar":"bar1"},"mapped_enum_value":{"two":2,"one":"ONE"},"numbered_value":{"10":"ten","9":"nine"}}"#;

        assert_eq!(
            transcode("grpcurl.test.MapMessage", input),
            r#"{"mapped_value":{"bar":"bar1","foo":"foo1"},"mapped_enum_value":{"one":"ONE","two":"TWO"},"mapped_nested_value":{},"numbered_value":{"9":"nine","10":"ten"}}"#
        );
    }

    #[test]
    fn unset_nested_messages_are_null() {
        assert_eq!(
            transcode(
                "grpcurl.test.MapMessage",
                r#"{"mapped_nested_value":{"foo":{"repeated_nested_values":[{"int32_value":1}]}}}"#
            ),
            r#"{"mapped_value":{},"mapped_enum_value":{},"mapped_nested_value":{"foo":{"nested_value":null,"repeated_nested_values":[{"int32_value":1,"string_value":""}]}},"numbered_value":{}}"#
        );
    }

    #[test]
    fn malformed_json_reports_position() {
        let codec = codec();
        let desc = message(&codec, "grpcurl.test.EchoMessage");

        let Err(CodecError::MalformedInput(err)) = codec.decode(&desc, b"{\n  \"value\": }") else {
            panic!("expected malformed input");
        };

        assert_eq!(err.line(), 2);
    }

    #[test]
    fn top_level_must_be_an_object() {
        let codec = codec();
        let desc = message(&codec, "grpcurl.test.EchoMessage");

        assert!(matches!(
            codec.decode(&desc, b"[1, 2]"),
            Err(CodecError::NotAnObject { found: "an array", .. })
        ));
    }

    #[test]
    fn wrong_json_type_is_rejected() {
        let codec = codec();
        let desc = message(&codec, "grpcurl.test.EchoMessage");

        assert!(matches!(
            codec.decode(&desc, br#"{"error_code":"abc"}"#),
            Err(CodecError::InvalidFieldValue { field, .. }) if field == "grpcurl.test.EchoMessage.error_code"
        ));
    }

    #[test]
    fn round_trip_is_stable() {
        let codec = codec();
        let desc = message(&codec, "grpcurl.test.MapMessage");
        let input = br#"{"mapped_nested_value":{"a":{"nested_value":{"int32_value":100,"string_value":"xxx"}}},"numbered_value":{"-1":"minus"}}"#;

        let first = codec.decode(&desc, input).unwrap();
        let encoded = codec.encode_to_string(&first);
        let second = codec.decode(&desc, encoded.as_bytes()).unwrap();

        assert_eq!(codec.encode_to_string(&second), encoded);
        assert_eq!(second, first);
    }
}

//! JSON mapping of the `google.protobuf` well-known types.
//!
//! `Any` is handled here: its payload goes through [`MessageCodec`] so that nested messages
//! follow the same rules as the top level, and an `Any` whose payload type cannot be resolved is
//! written as `{"@type": url}`.
//!
//! Every other well-known type (`Timestamp`, `Duration`, `FieldMask`, `Struct`, `Value`,
//! `ListValue`, `Empty` and the wrappers) uses the canonical Protobuf JSON mapping implemented by
//! `prost-reflect`, with 64-bit integers written as JSON numbers.
use super::{CodecError, MessageCodec, json_type, set_field};
use prost::Message;
use prost_reflect::{
    DeserializeOptions, DynamicMessage, FieldDescriptor, MessageDescriptor, ReflectMessage,
    SerializeOptions, Value,
};
use serde_json::{Map, Value as JsonValue};

pub(super) const NULL_VALUE: &str = "google.protobuf.NullValue";

const TYPE_KEY: &str = "@type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WellKnownType {
    Any,
    /// Mapped by `prost-reflect`.
    Canonical,
}

impl WellKnownType {
    pub(super) fn of(desc: &MessageDescriptor) -> Option<Self> {
        let wkt = match desc.full_name() {
            "google.protobuf.Any" => Self::Any,
            "google.protobuf.Timestamp"
            | "google.protobuf.Duration"
            | "google.protobuf.FieldMask"
            | "google.protobuf.Struct"
            | "google.protobuf.Value"
            | "google.protobuf.ListValue"
            | "google.protobuf.Empty"
            | "google.protobuf.DoubleValue"
            | "google.protobuf.FloatValue"
            | "google.protobuf.Int64Value"
            | "google.protobuf.UInt64Value"
            | "google.protobuf.Int32Value"
            | "google.protobuf.UInt32Value"
            | "google.protobuf.BoolValue"
            | "google.protobuf.StringValue"
            | "google.protobuf.BytesValue" => Self::Canonical,
            _ => return None,
        };

        Some(wkt)
    }
}

impl MessageCodec {
    pub(super) fn encode_well_known(
        &self,
        wkt: WellKnownType,
        message: &DynamicMessage,
    ) -> JsonValue {
        match wkt {
            WellKnownType::Any => self.encode_any(message),
            WellKnownType::Canonical => {
                let options = SerializeOptions::new().stringify_64_bit_integers(false);

                match message.serialize_with_options(serde_json::value::Serializer, &options) {
                    Ok(value) => value,
                    Err(err) => {
                        // e.g. a Timestamp out of the RFC 3339 range
                        tracing::warn!(
                            message = %message.descriptor().full_name(),
                            error = %err,
                            "well-known type has no JSON mapping, writing its fields"
                        );
                        self.encode_fields(message)
                    }
                }
            }
        }
    }

    pub(super) fn decode_well_known(
        &self,
        wkt: WellKnownType,
        desc: &MessageDescriptor,
        value: JsonValue,
    ) -> Result<DynamicMessage, CodecError> {
        match wkt {
            WellKnownType::Any => self.decode_any(desc, value),
            WellKnownType::Canonical => {
                let found = value.to_string();
                let options = DeserializeOptions::new().deny_unknown_fields(false);

                DynamicMessage::deserialize_with_options(desc.clone(), value, &options).map_err(
                    |err| {
                        tracing::debug!(
                            message = desc.full_name(),
                            error = %err,
                            "well-known type does not accept the value"
                        );
                        invalid(desc, "the JSON mapping of the well-known type", found)
                    },
                )
            }
        }
    }

    fn encode_any(&self, message: &DynamicMessage) -> JsonValue {
        let type_url = message
            .get_field_by_name("type_url")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let mut object = Map::new();
        if type_url.is_empty() {
            return JsonValue::Object(object);
        }
        object.insert(TYPE_KEY.to_string(), JsonValue::String(type_url.clone()));

        let Some(payload_desc) = self.resolve_any_type(&type_url, &message.descriptor()) else {
            tracing::debug!(type_url, "payload type of Any is unknown, writing its type only");
            return JsonValue::Object(object);
        };

        let bytes = message
            .get_field_by_name("value")
            .and_then(|v| v.as_bytes().cloned())
            .unwrap_or_default();

        let payload = match DynamicMessage::decode(payload_desc.clone(), bytes) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(type_url, error = %err, "payload of Any does not decode");
                return JsonValue::Object(object);
            }
        };

        match (WellKnownType::of(&payload_desc), self.encode(&payload)) {
            (None, JsonValue::Object(fields)) => object.extend(fields),
            (_, encoded) => {
                object.insert("value".to_string(), encoded);
            }
        }

        JsonValue::Object(object)
    }

    fn decode_any(
        &self,
        desc: &MessageDescriptor,
        value: JsonValue,
    ) -> Result<DynamicMessage, CodecError> {
        let mut message = DynamicMessage::new(desc.clone());

        let JsonValue::Object(mut object) = value else {
            return Err(CodecError::NotAnObject {
                message: desc.full_name().to_string(),
                found: json_type(&value),
            });
        };

        let type_url = match object.remove(TYPE_KEY) {
            Some(JsonValue::String(type_url)) => type_url,
            None if object.is_empty() => return Ok(message),
            other => {
                let found = other.unwrap_or(JsonValue::Null);
                return Err(invalid(desc, "a string \"@type\" entry", found.to_string()));
            }
        };

        set_named(&mut message, desc, "type_url", Value::String(type_url.clone()))?;

        let Some(payload_desc) = self.resolve_any_type(&type_url, desc) else {
            tracing::debug!(type_url, "payload type of Any is unknown, leaving it empty");
            return Ok(message);
        };

        let payload_json = match WellKnownType::of(&payload_desc) {
            Some(_) => object.remove("value").unwrap_or(JsonValue::Null),
            None => JsonValue::Object(object),
        };

        let payload = self.decode_value(&payload_desc, payload_json)?;
        set_named(
            &mut message,
            desc,
            "value",
            Value::Bytes(payload.encode_to_vec().into()),
        )?;

        Ok(message)
    }

    fn resolve_any_type(
        &self,
        type_url: &str,
        any_desc: &MessageDescriptor,
    ) -> Option<MessageDescriptor> {
        let name = type_url.rsplit_once('/').map_or(type_url, |(_, name)| name);

        self.pool
            .get_message_by_name(name)
            .or_else(|| any_desc.parent_pool().get_message_by_name(name))
    }
}

fn named_field(desc: &MessageDescriptor, name: &str) -> Result<FieldDescriptor, CodecError> {
    desc.get_field_by_name(name)
        .ok_or_else(|| CodecError::InvalidFieldValue {
            field: format!("{}.{name}", desc.full_name()),
            expected: "a field declared by the well-known type",
            found: "a schema without it".to_string(),
        })
}

fn set_named(
    message: &mut DynamicMessage,
    desc: &MessageDescriptor,
    name: &str,
    value: Value,
) -> Result<(), CodecError> {
    let field = named_field(desc, name)?;
    set_field(message, &field, value)
}

fn invalid(desc: &MessageDescriptor, expected: &'static str, found: String) -> CodecError {
    CodecError::InvalidFieldValue {
        field: desc.full_name().to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;

    fn setup() -> (MessageCodec, MessageDescriptor) {
        let pool = DescriptorPool::decode(test_service::FILE_DESCRIPTOR_SET).unwrap();
        let desc = pool
            .get_message_by_name("grpcurl.test.WellKnownMessage")
            .unwrap();

        (MessageCodec::new(pool), desc)
    }

    fn transcode(input: &str) -> String {
        let (codec, desc) = setup();

        let decoded = codec.decode(&desc, input.as_bytes()).unwrap();
        codec.encode_to_string(&decoded)
    }

    #[test]
    fn unset_well_known_fields_are_null() {
        assert_eq!(
            transcode("{}"),
            r#"{"timestamp_value":null,"duration_value":null,"string_wrapper":null,"int64_wrapper":null,"struct_value":null,"any_value":null,"field_mask":null,"bytes_value":""}"#
        );
    }

    #[test]
    fn scalars_and_wrappers() {
        let output = transcode(
            r#"{"timestamp_value":"2021-02-03T04:05:06Z","duration_value":"1.5s","string_wrapper":"abc","int64_wrapper":"42","field_mask":"fooBar,baz","bytes_value":"AAEC"}"#,
        );

        assert_eq!(
            output,
            r#"{"timestamp_value":"2021-02-03T04:05:06Z","duration_value":"1.500s","string_wrapper":"abc","int64_wrapper":42,"struct_value":null,"any_value":null,"field_mask":"fooBar,baz","bytes_value":"AAEC"}"#
        );
    }

    #[test]
    fn struct_values() {
        let output = transcode(r#"{"struct_value":{"b":[true,null,"x"],"a":1,"c":{"d":2.5}}}"#);
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(
            value["struct_value"].to_string(),
            r#"{"a":1.0,"b":[true,null,"x"],"c":{"d":2.5}}"#
        );
    }

    #[test]
    fn any_with_known_payload() {
        let output = transcode(
            r#"{"any_value":{"@type":"type.googleapis.com/grpcurl.test.SimpleMessage","string_value":"x"}}"#,
        );
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(
            value["any_value"].to_string(),
            r#"{"@type":"type.googleapis.com/grpcurl.test.SimpleMessage","string_value":"x","bool_value":false}"#
        );
    }

    #[test]
    fn any_with_well_known_payload() {
        let output = transcode(
            r#"{"any_value":{"@type":"type.googleapis.com/google.protobuf.Duration","value":"2s"}}"#,
        );
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(
            value["any_value"].to_string(),
            r#"{"@type":"type.googleapis.com/google.protobuf.Duration","value":"2s"}"#
        );
    }

    #[test]
    fn any_with_unknown_payload_keeps_only_its_type() {
        let output = transcode(
            r#"{"any_value":{"@type":"type.googleapis.com/unknown.Thing","field":1}}"#,
        );
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(
            value["any_value"].to_string(),
            r#"{"@type":"type.googleapis.com/unknown.Thing"}"#
        );
    }

    #[test]
    fn any_round_trip_is_exact() {
        let (codec, desc) = setup();

        for input in [
            r#"{"any_value":{"@type":"type.googleapis.com/grpcurl.test.SimpleMessage","string_value":"x"}}"#,
            r#"{"any_value":{"@type":"type.googleapis.com/google.protobuf.Duration","value":"2s"}}"#,
        ] {
            let decoded = codec.decode(&desc, input.as_bytes()).unwrap();
            let encoded = codec.encode_to_string(&decoded);
            let redecoded = codec.decode(&desc, encoded.as_bytes()).unwrap();

            assert_eq!(redecoded, decoded, "{input} was encoded as {encoded}");
        }
    }

    #[test]
    fn invalid_well_known_values_are_rejected() {
        let (codec, desc) = setup();

        for input in [
            r#"{"timestamp_value":"yesterday"}"#,
            r#"{"duration_value":"1.5"}"#,
            r#"{"int64_wrapper":"forty-two"}"#,
        ] {
            let result = codec.decode(&desc, input.as_bytes());
            assert!(
                matches!(result, Err(CodecError::InvalidFieldValue { .. })),
                "{input} decoded as {result:?}"
            );
        }
    }
}

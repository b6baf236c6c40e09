//! # Metadata
//!
//! Request and response metadata as an ordered list of `key: value` pairs.
//!
//! Outgoing metadata is written on the command line as `-H "key: value"`. Incoming headers and
//! trailers are printed back in the same form. Keys ending in `-bin` carry binary values, written
//! and printed as base64.
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use tonic::metadata::{
    AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue,
    KeyAndValueRef, MetadataMap,
};

const BINARY_SUFFIX: &str = "-bin";

/// An ordered multimap of metadata entries with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSet {
    entries: Vec<(String, String)>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key: value` header specs.
    ///
    /// Each spec is split on its first colon. Leading spaces are trimmed from the value, the key
    /// is trimmed on both sides. Specs without a colon or with an empty key are skipped.
    pub fn parse_header_specs<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();

        for spec in specs {
            let spec = spec.as_ref();

            let Some((key, value)) = spec.split_once(':') else {
                tracing::debug!(spec, "skipping header without a colon");
                continue;
            };

            let key = key.trim();
            if key.is_empty() {
                tracing::debug!(spec, "skipping header with an empty key");
                continue;
            }

            set.append(key, value.trim_start_matches(' '));
        }

        set
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// The first value stored under `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `key: value` line per entry.
    pub fn format_lines(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{k}: {v}")).collect()
    }

    /// Copies every entry into a `tonic` metadata map.
    ///
    /// Entries that are not valid gRPC metadata are dropped.
    pub fn apply_to(&self, map: &mut MetadataMap) {
        for (key, value) in self.iter() {
            if key.to_ascii_lowercase().ends_with(BINARY_SUFFIX) {
                append_binary(map, key, value);
            } else {
                append_ascii(map, key, value);
            }
        }
    }

    pub fn to_metadata_map(&self) -> MetadataMap {
        let mut map = MetadataMap::new();
        self.apply_to(&mut map);
        map
    }
}

impl From<&MetadataMap> for MetadataSet {
    fn from(map: &MetadataMap) -> Self {
        let mut set = Self::new();

        for entry in map.iter() {
            match entry {
                KeyAndValueRef::Ascii(key, value) => set.append(
                    key.as_str(),
                    String::from_utf8_lossy(value.as_encoded_bytes()),
                ),
                // Binary values are kept in their base64 wire form.
                KeyAndValueRef::Binary(key, value) => set.append(
                    key.as_str(),
                    String::from_utf8_lossy(value.as_encoded_bytes()),
                ),
            }
        }

        set
    }
}

impl<K, V> FromIterator<(K, V)> for MetadataSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn append_ascii(map: &mut MetadataMap, key: &str, value: &str) {
    let Ok(metadata_key) = key.parse::<AsciiMetadataKey>() else {
        tracing::warn!(key, "dropping header with an invalid key");
        return;
    };

    let Ok(metadata_value) = value.parse::<AsciiMetadataValue>() else {
        tracing::warn!(key, "dropping header with an invalid value");
        return;
    };

    map.append(metadata_key, metadata_value);
}

fn append_binary(map: &mut MetadataMap, key: &str, value: &str) {
    let Ok(metadata_key) = BinaryMetadataKey::from_bytes(key.as_bytes()) else {
        tracing::warn!(key, "dropping binary header with an invalid key");
        return;
    };

    let bytes = STANDARD
        .decode(value)
        .or_else(|_| STANDARD_NO_PAD.decode(value))
        .unwrap_or_else(|_| value.as_bytes().to_vec());

    map.append_bin(metadata_key, BinaryMetadataValue::from_bytes(&bytes));
}

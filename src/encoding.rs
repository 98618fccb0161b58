//! Serde helpers for byte fields stored as base64 strings.
//!
//! Shared by the record model, the container header and backups.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(s).map_err(serde::de::Error::custom)
}

pub(crate) fn base64_encode_opt<S>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match data {
        Some(bytes) => serializer.serialize_some(&BASE64.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn base64_decode_opt<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        #[serde(serialize_with = "super::base64_encode", deserialize_with = "super::base64_decode")]
        data: Vec<u8>,
        #[serde(
            default,
            serialize_with = "super::base64_encode_opt",
            deserialize_with = "super::base64_decode_opt"
        )]
        icon: Option<Vec<u8>>,
    }

    #[test]
    fn bytes_are_written_as_base64() {
        let blob = Blob {
            data: b"foo".to_vec(),
            icon: None,
        };
        let json = serde_json::to_string(&blob).unwrap();
        assert_eq!(json, r#"{"data":"Zm9v","icon":null}"#);
        assert_eq!(serde_json::from_str::<Blob>(&json).unwrap(), blob);
    }

    #[test]
    fn missing_optional_and_bad_base64() {
        let blob: Blob = serde_json::from_str(r#"{"data":""}"#).unwrap();
        assert_eq!(blob.icon, None);
        assert!(serde_json::from_str::<Blob>(r#"{"data":"%%%"}"#).is_err());
    }
}

use serde::de::DeserializeOwned;

use crate::error::ValidationError;

/// Convert an already-checked value into `T`, keeping the JSON path of the
/// first mismatch.
pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ValidationError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| ValidationError::Deserialize {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ValidationError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();
        if inner.is_syntax() || inner.is_eof() {
            ValidationError::Parse(inner.to_string())
        } else {
            ValidationError::Deserialize { path, message: inner.to_string() }
        }
    })
}

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("unsupported secrets file type: {0:?}")]
    UnsupportedType(String),

    #[error("failed to read secrets file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid secrets: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path '{0}' does not exist")]
    MissingPath(String),
}

/// Read a JSON secrets file
pub fn load_secrets_file<P: AsRef<Path>>(path: P) -> Result<Value, SecretsError> {
    let path = path.as_ref();
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    if extension != "json" {
        return Err(SecretsError::UnsupportedType(extension.to_string()));
    }

    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Walk a dot-separated path, e.g. `okx.main`
pub fn get_api<'a>(secrets: &'a Value, dotted_path: &str) -> Result<&'a Value, SecretsError> {
    dotted_path
        .split('.')
        .try_fold(secrets, |current, key| current.get(key))
        .ok_or_else(|| SecretsError::MissingPath(dotted_path.to_string()))
}

/// Typed credentials at `dotted_path`, e.g. an exchange's auth struct
pub fn credentials<A: DeserializeOwned>(secrets: &Value, dotted_path: &str) -> Result<A, SecretsError> {
    let api = get_api(secrets, dotted_path)?;
    Ok(A::deserialize(api)?)
}

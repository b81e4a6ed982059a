//! Storage for patient signature images.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Signature is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Signature is empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Somewhere signature images can be put and later fetched by URL.
pub trait SignatureStore: Send + Sync {
    /// Store a PNG signature for a session and return its public URL.
    ///
    /// `data` is either bare base64 or a `data:image/...;base64,` URL.
    fn store(&self, session_id: &str, data: &str) -> Result<String, SignatureError>;
}

/// Writes signatures as files under a directory served at `base_url`.
#[derive(Debug, Clone)]
pub struct FsSignatureStore {
    dir: PathBuf,
    base_url: String,
}

impl FsSignatureStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
        }
    }
}

impl SignatureStore for FsSignatureStore {
    fn store(&self, session_id: &str, data: &str) -> Result<String, SignatureError> {
        let bytes = decode_data_url(data)?;
        if bytes.is_empty() {
            return Err(SignatureError::Empty);
        }

        std::fs::create_dir_all(&self.dir)?;
        let file_name = format!(
            "{}_{}.png",
            session_id,
            chrono::Utc::now().timestamp_millis()
        );
        std::fs::write(self.dir.join(&file_name), bytes)?;

        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            file_name
        ))
    }
}

/// Strip an optional data-URL header and decode the base64 payload.
fn decode_data_url(data: &str) -> Result<Vec<u8>, SignatureError> {
    let payload = match data.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, b64)| b64).unwrap_or(""),
        None => data,
    };
    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn test_store_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSignatureStore::new(dir.path().join("sig"), "/signatures/");

        let url = store
            .store("session-1", &format!("data:image/png;base64,{}", PIXEL))
            .unwrap();
        assert!(url.starts_with("/signatures/session-1_"));
        assert!(url.ends_with(".png"));

        let file_name = url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join("sig").join(file_name)).unwrap();
        assert_eq!(&written[1..4], b"PNG");
    }

    #[test]
    fn test_bare_base64_accepted() {
        assert!(decode_data_url(PIXEL).unwrap().len() > 8);
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSignatureStore::new(dir.path(), "/signatures");
        assert!(matches!(
            store.store("s1", "data:image/png;base64,***"),
            Err(SignatureError::Decode(_))
        ));
        assert!(matches!(
            store.store("s1", "data:image/png;base64,"),
            Err(SignatureError::Empty)
        ));
    }
}

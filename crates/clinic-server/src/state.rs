//! Shared request state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clinic_core::{ClinicResult, Database};

use crate::config::{ServerConfig, DEFAULT_IO_TIMEOUT_MS};
use crate::error::ApiError;
use crate::signatures::SignatureStore;

/// State handed to every handler.
///
/// The database sits behind a mutex and is only touched from the blocking
/// pool, so a slow disk never stalls the async workers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    signatures: Arc<dyn SignatureStore>,
    api_key: Option<Arc<str>>,
    io_timeout: Duration,
}

impl AppState {
    pub fn new(db: Database, signatures: Arc<dyn SignatureStore>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            signatures,
            api_key: None,
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
        }
    }

    pub fn from_config(db: Database, signatures: Arc<dyn SignatureStore>, config: &ServerConfig) -> Self {
        let state = Self::new(db, signatures).with_io_timeout(config.io_timeout);
        match &config.api_key {
            Some(key) => state.with_api_key(key.clone()),
            None => state,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Arc::from(key.into()));
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Run a store operation on the blocking pool.
    ///
    /// The I/O timeout bounds the wait for the database. An operation that
    /// has not started when it expires never runs; one that already holds
    /// the database runs to completion and its result is returned, so a
    /// `Timeout` always means nothing was written.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> ClinicResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let claimed = Arc::new(AtomicBool::new(false));
        let task_claimed = Arc::clone(&claimed);
        let mut task = tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| ApiError::Internal("database mutex poisoned".into()))?;
            if task_claimed.swap(true, Ordering::AcqRel) {
                return Err(ApiError::Timeout);
            }
            op(&*guard).map_err(ApiError::from)
        });

        let waited = tokio::time::timeout(self.io_timeout, &mut task).await;
        let joined = match waited {
            Ok(joined) => joined,
            Err(_) if !claimed.swap(true, Ordering::AcqRel) => {
                tracing::warn!("Storage operation abandoned before it started");
                return Err(ApiError::Timeout);
            }
            Err(_) => task.await,
        };
        joined.map_err(|e| ApiError::Internal(format!("storage task failed: {}", e)))?
    }

    /// Store a signature image, returning its URL.
    ///
    /// Failures are logged and yield `None`; a lost signature never blocks
    /// recording the attendance.
    pub async fn store_signature(&self, session_id: &str, data: String) -> Option<String> {
        let store = Arc::clone(&self.signatures);
        let owned_session = session_id.to_string();
        let task = tokio::task::spawn_blocking(move || store.store(&owned_session, &data));

        match tokio::time::timeout(self.io_timeout, task).await {
            Ok(Ok(Ok(url))) => Some(url),
            Ok(Ok(Err(e))) => {
                tracing::warn!(session_id, "Signature not stored: {}", e);
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id, "Signature task failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(session_id, "Signature storage timed out");
                None
            }
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use flick_crypto::MessageCipher;
use flick_db::{Database, StoreResult};

use crate::error::ApiError;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

/// Shared, read-only after startup. Key material lives inside `tokens` and
/// `cipher` and is never mutated.
pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub cipher: MessageCipher,
    /// Upper bound on one handler's storage work.
    pub db_deadline: Duration,
}

impl AppStateInner {
    pub fn new(db: Database, tokens: TokenService, cipher: MessageCipher, db_deadline: Duration) -> AppState {
        Arc::new(Self {
            db,
            tokens,
            cipher,
            db_deadline,
        })
    }
}

/// Run blocking storage work off the async runtime, bounded by the
/// configured deadline.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let shared = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&shared.db));

    match tokio::time::timeout(state.db_deadline, task).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::internal("storage task failed"))
        }
        Err(_) => Err(ApiError::internal(format!(
            "storage deadline of {:?} exceeded",
            state.db_deadline
        ))),
    }
}

/// Same as [`run_db`] for CPU-bound work that does not touch storage
/// (password hashing).
pub async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::internal("blocking task failed")
    })?
}

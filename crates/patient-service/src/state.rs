//! Shared handler state.

use std::sync::{Arc, Mutex};

use dental_core::db::Documents;
use dental_core::external::{DirectoryLookup, FeeLookup, Noop, NotificationSink};
use dental_core::{Database, DentalResult};

use crate::error::ApiError;

/// Database handle plus the upstream capabilities.
///
/// SQLite work is synchronous, so handlers hop onto the blocking pool via
/// [`AppState::run`] and hold the connection lock for the whole operation.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    pub fees: Arc<dyn FeeLookup>,
    pub directory: Arc<dyn DirectoryLookup>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl AppState {
    pub fn new(
        db: Database,
        fees: Arc<dyn FeeLookup>,
        directory: Arc<dyn DirectoryLookup>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            fees,
            directory,
            notifications,
        }
    }

    /// State with every upstream switched off.
    pub fn offline(db: Database) -> Self {
        Self::new(db, Arc::new(Noop), Arc::new(Noop), Arc::new(Noop))
    }

    /// Run a closure against the database on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> DentalResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| ApiError::Internal("database lock poisoned".into()))?;
            f(&mut guard).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
    }

    /// Like [`AppState::run`], inside a unit of work committed only on success.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(Documents<'_>) -> DentalResult<T> + Send + 'static,
    {
        self.run(move |db| {
            let uow = db.unit_of_work()?;
            let value = f(uow.documents())?;
            uow.commit()?;
            Ok(value)
        })
        .await
    }
}

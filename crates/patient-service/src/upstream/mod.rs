//! HTTP clients for the neighbouring services.
//!
//! Both clients use `reqwest::blocking`: they are only ever called from
//! inside [`AppState::run`](crate::state::AppState::run) on the blocking
//! pool, and must be built outside the async runtime.

mod directory;
mod notifications;

pub use directory::ClinicDirectoryClient;
pub use notifications::NotificationClient;

use std::sync::Arc;

use dental_core::external::{DirectoryLookup, FeeLookup, Noop, NotificationSink, UpstreamError};

use crate::config::ServiceConfig;

/// Upstream capabilities wired from configuration; unset URLs get [`Noop`].
pub struct Upstreams {
    pub fees: Arc<dyn FeeLookup>,
    pub directory: Arc<dyn DirectoryLookup>,
    pub notifications: Arc<dyn NotificationSink>,
}

pub fn connect(config: &ServiceConfig) -> Result<Upstreams, reqwest::Error> {
    let (fees, directory): (Arc<dyn FeeLookup>, Arc<dyn DirectoryLookup>) =
        match &config.clinic_directory_url {
            Some(url) => {
                let client = Arc::new(ClinicDirectoryClient::new(url, config.upstream_timeout)?);
                (client.clone(), client)
            }
            None => (Arc::new(Noop), Arc::new(Noop)),
        };

    let notifications: Arc<dyn NotificationSink> = match &config.notification_url {
        Some(url) => Arc::new(NotificationClient::new(url, config.upstream_timeout)?),
        None => Arc::new(Noop),
    };

    Ok(Upstreams {
        fees,
        directory,
        notifications,
    })
}

fn send_error(base_url: &str, e: reqwest::Error) -> UpstreamError {
    if e.is_connect() {
        UpstreamError::Unavailable(format!("cannot reach {base_url}"))
    } else if e.is_timeout() {
        UpstreamError::Unavailable(format!("{base_url} timed out"))
    } else {
        UpstreamError::Unavailable(e.to_string())
    }
}

use std::time::Duration;

use dental_core::external::{Notification, NotificationSink, UpstreamError, UpstreamResult};

use super::send_error;

/// Notification service client.
pub struct NotificationClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl NotificationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl NotificationSink for NotificationClient {
    fn notify(&self, notification: &Notification) -> UpstreamResult<()> {
        let url = format!("{}/notifications", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(notification)
            .send()
            .map_err(|e| send_error(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

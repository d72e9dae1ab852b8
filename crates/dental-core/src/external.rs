//! Capabilities the core borrows from neighbouring services.
//!
//! Every call here is best-effort: callers log an [`UpstreamError`] and fall
//! back to a default. None of these errors converts into
//! [`DentalError`](crate::error::DentalError).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream returned status {status}")]
    Status { status: u16 },

    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Doctor profile as published by the clinic directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub name: String,
    pub department: Option<String>,
}

/// Message handed to the notification service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: String,
    pub patient_id: String,
    pub clinic_id: String,
    pub doctor_id: String,
    pub appointment_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub message: String,
}

/// Consultation fee for a doctor at a clinic.
pub trait FeeLookup: Send + Sync {
    fn consultation_fee(&self, clinic_id: &str, doctor_id: &str) -> UpstreamResult<f64>;
}

/// Doctor profile lookup.
pub trait DirectoryLookup: Send + Sync {
    fn doctor(&self, doctor_id: &str) -> UpstreamResult<Option<DoctorProfile>>;
}

/// Fire-and-forget notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification) -> UpstreamResult<()>;
}

/// Stand-in used when a collaborator is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl FeeLookup for Noop {
    fn consultation_fee(&self, _clinic_id: &str, _doctor_id: &str) -> UpstreamResult<f64> {
        Ok(0.0)
    }
}

impl DirectoryLookup for Noop {
    fn doctor(&self, _doctor_id: &str) -> UpstreamResult<Option<DoctorProfile>> {
        Ok(None)
    }
}

impl NotificationSink for Noop {
    fn notify(&self, _notification: &Notification) -> UpstreamResult<()> {
        Ok(())
    }
}

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use dental_core::external::{
    DirectoryLookup, DoctorProfile, FeeLookup, UpstreamError, UpstreamResult,
};

use super::send_error;

/// Clinic directory: consultation fees and doctor profiles.
pub struct ClinicDirectoryClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeResponse {
    consultation_fee: f64,
}

impl ClinicDirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get(&self, path: &str) -> UpstreamResult<reqwest::blocking::Response> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .get(&url)
            .send()
            .map_err(|e| send_error(&self.base_url, e))
    }
}

impl FeeLookup for ClinicDirectoryClient {
    fn consultation_fee(&self, clinic_id: &str, doctor_id: &str) -> UpstreamResult<f64> {
        let response = self.get(&format!("/clinics/{clinic_id}/doctors/{doctor_id}/fee"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: FeeResponse = response
            .json()
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        if !parsed.consultation_fee.is_finite() || parsed.consultation_fee < 0.0 {
            return Err(UpstreamError::Malformed(format!(
                "fee {} out of range",
                parsed.consultation_fee
            )));
        }
        Ok(parsed.consultation_fee)
    }
}

impl DirectoryLookup for ClinicDirectoryClient {
    fn doctor(&self, doctor_id: &str) -> UpstreamResult<Option<DoctorProfile>> {
        let response = self.get(&format!("/doctors/{doctor_id}"))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<DoctorProfile>()
            .map(Some)
            .map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

//! Patient models.

use serde::{Deserialize, Serialize};

use super::chart::DentalChart;

/// A patient document with its embedded dental chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Externally supplied clinical identity
    pub patient_id: String,
    /// Clinic the patient is registered with
    pub clinic_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Authoritative per-tooth state, owned by this document
    #[serde(default)]
    pub dental_chart: DentalChart,
    #[serde(default)]
    pub treatment_plan_ids: Vec<String>,
    #[serde(default)]
    pub visit_ids: Vec<String>,
    /// Optimistic concurrency counter, bumped on every save
    #[serde(default)]
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with an empty chart.
    pub fn new(patient_id: String, clinic_id: String, name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            patient_id,
            clinic_id,
            name,
            phone: None,
            email: None,
            dental_chart: DentalChart::new(),
            treatment_plan_ids: Vec::new(),
            visit_ids: Vec::new(),
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn link_plan(&mut self, plan_id: &str) {
        if !self.treatment_plan_ids.iter().any(|id| id == plan_id) {
            self.treatment_plan_ids.push(plan_id.to_string());
        }
    }

    pub fn link_visit(&mut self, visit_id: &str) {
        if !self.visit_ids.iter().any(|id| id == visit_id) {
            self.visit_ids.push(visit_id.to_string());
        }
    }
}

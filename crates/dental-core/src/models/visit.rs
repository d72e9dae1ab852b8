//! Visit (patient history) models.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::chart::ToothRecord;
use super::tooth::{ProcedureStatus, Surface, ToothNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    /// Created inside a running consultation
    #[default]
    Open,
    /// Consultation committed
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub medicine: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

/// One tooth/surface/procedure tuple worked on during the visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DentalWork {
    pub tooth_number: ToothNumber,
    pub surface: Surface,
    pub procedure: String,
    pub status: ProcedureStatus,
    pub cost: Option<f64>,
}

/// Follow-up booking requested during the consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recall {
    pub date: String,
    pub time: Option<String>,
    pub notes: Option<String>,
}

/// Immutable record of one consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub visit_id: String,
    pub patient_id: String,
    pub appointment_id: String,
    pub doctor_id: String,
    pub doctor_name: Option<String>,
    pub clinic_id: String,
    pub department: Option<String>,
    #[serde(default)]
    pub chief_complaints: Vec<String>,
    #[serde(default)]
    pub examination_findings: Vec<String>,
    #[serde(default)]
    pub dental_history: Vec<String>,
    #[serde(default)]
    pub diagnosis: Vec<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub notes: Option<String>,
    #[serde(default)]
    pub dental_work: Vec<DentalWork>,
    #[serde(default)]
    pub planned_work: Vec<DentalWork>,
    /// Chart as the doctor found it at the start of the visit
    #[serde(default)]
    pub dental_chart_snapshot: Vec<ToothRecord>,
    pub snapshot_digest: String,
    pub consultation_fee: f64,
    pub recall: Option<Recall>,
    pub treatment_plan_id: Option<String>,
    pub status: VisitStatus,
    pub created_at: String,
}

impl Visit {
    pub fn new(
        patient_id: String,
        appointment_id: String,
        doctor_id: String,
        clinic_id: String,
    ) -> Self {
        Self {
            visit_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            appointment_id,
            doctor_id,
            doctor_name: None,
            clinic_id,
            department: None,
            chief_complaints: Vec::new(),
            examination_findings: Vec::new(),
            dental_history: Vec::new(),
            diagnosis: Vec::new(),
            prescriptions: Vec::new(),
            notes: None,
            dental_work: Vec::new(),
            planned_work: Vec::new(),
            dental_chart_snapshot: Vec::new(),
            snapshot_digest: String::new(),
            consultation_fee: 0.0,
            recall: None,
            treatment_plan_id: None,
            status: VisitStatus::Open,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Store the chart snapshot together with its SHA-256 digest.
    pub fn set_snapshot(&mut self, teeth: Vec<ToothRecord>) -> Result<(), serde_json::Error> {
        self.snapshot_digest = snapshot_digest(&teeth)?;
        self.dental_chart_snapshot = teeth;
        Ok(())
    }

    /// Check the snapshot against its recorded digest.
    pub fn snapshot_intact(&self) -> bool {
        snapshot_digest(&self.dental_chart_snapshot)
            .map(|d| d == self.snapshot_digest)
            .unwrap_or(false)
    }
}

fn snapshot_digest(teeth: &[ToothRecord]) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(teeth)?;
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

//! Appointment models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    /// Follow-up booked from a consultation
    Recall,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Recall => "recall",
        }
    }

    /// Whether a consultation may still be recorded against it.
    pub fn is_consultable(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed | AppointmentStatus::Recall
        )
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "recall" => Ok(AppointmentStatus::Recall),
            _ => Err(format!("Unknown appointment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub appointment_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub clinic_id: String,
    pub department: Option<String>,
    pub date: String,
    pub time: Option<String>,
    pub status: AppointmentStatus,
    pub visit_id: Option<String>,
    /// Visit that booked this appointment as a recall
    pub previous_visit_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    pub fn new(patient_id: String, doctor_id: String, clinic_id: String, date: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            appointment_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            doctor_id,
            clinic_id,
            department: None,
            date,
            time: None,
            status: AppointmentStatus::Scheduled,
            visit_id: None,
            previous_visit_id: None,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Follow-up for the same clinic, doctor and department.
    pub fn recall_of(&self, visit_id: &str, date: String, time: Option<String>) -> Self {
        let mut recall = Appointment::new(
            self.patient_id.clone(),
            self.doctor_id.clone(),
            self.clinic_id.clone(),
            date,
        );
        recall.department = self.department.clone();
        recall.time = time;
        recall.status = AppointmentStatus::Recall;
        recall.previous_visit_id = Some(visit_id.to_string());
        recall
    }
}

//! Treatment plan models.
//!
//! A plan groups planned procedures per tooth and orders them into stages.
//! Stage and plan statuses are stored for readers but always recomputed by
//! [`TreatmentPlan::refresh`](crate::plan) after a mutation.

use serde::{Deserialize, Serialize};

use super::tooth::{ProcedureStatus, Surface, ToothNumber};

/// Plan-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Draft,
    Ongoing,
    Completed,
    /// Terminal, only reachable through explicit cancellation
    Cancelled,
}

impl PlanStatus {
    /// Completed and cancelled plans only accept reads.
    pub fn is_closed(self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Ongoing => "ongoing",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        }
    }
}

/// Stage-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A procedure scheduled on a tooth surface within a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedProcedure {
    pub name: String,
    pub surface: Surface,
    /// 1-based stage number this procedure belongs to
    pub stage: u32,
    pub status: ProcedureStatus,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
    pub completed_at: Option<String>,
    pub completed_in_visit_id: Option<String>,
    pub performed_by: Option<String>,
}

impl PlannedProcedure {
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn matches(&self, name: &str, surface: Surface) -> bool {
        self.surface == surface && self.name.eq_ignore_ascii_case(name)
    }

    pub fn complete(&mut self, visit_id: Option<&str>, doctor_id: &str, at: &str) {
        self.status = ProcedureStatus::Completed;
        self.completed_at = Some(at.to_string());
        self.completed_in_visit_id = visit_id.map(str::to_string);
        self.performed_by = Some(doctor_id.to_string());
    }
}

/// All planned work on one tooth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToothPlan {
    pub tooth_number: ToothNumber,
    #[serde(default)]
    pub priority: Priority,
    pub is_completed: bool,
    #[serde(default)]
    pub procedures: Vec<PlannedProcedure>,
}

/// Procedure names grouped under one surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceProcedures {
    pub surface: Surface,
    #[serde(default)]
    pub procedure_names: Vec<String>,
}

/// Denormalised per-stage summary of one tooth's surfaces and procedures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToothSurfaceProcedures {
    pub tooth_number: ToothNumber,
    #[serde(default)]
    pub surface_procedures: Vec<SurfaceProcedures>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub stage_number: u32,
    pub stage_name: String,
    pub description: Option<String>,
    pub status: StageStatus,
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub tooth_surface_procedures: Vec<ToothSurfaceProcedures>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlan {
    pub plan_id: String,
    pub patient_id: String,
    pub clinic_id: String,
    pub created_by_doctor_id: String,
    pub plan_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub teeth: Vec<ToothPlan>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    pub status: PlanStatus,
    pub current_stage: u32,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<String>,
    pub cancelled_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TreatmentPlan {
    /// Empty draft plan owned by a patient.
    pub fn new(
        patient_id: String,
        clinic_id: String,
        created_by_doctor_id: String,
        plan_name: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            clinic_id,
            created_by_doctor_id,
            plan_name,
            description: None,
            teeth: Vec::new(),
            stages: Vec::new(),
            status: PlanStatus::Draft,
            current_stage: 1,
            started_at: None,
            completed_at: None,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn stage(&self, stage_number: u32) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage_number == stage_number)
    }

    /// Every procedure in a stage, paired with its tooth.
    pub fn stage_procedures(
        &self,
        stage_number: u32,
    ) -> impl Iterator<Item = (ToothNumber, &PlannedProcedure)> {
        self.teeth.iter().flat_map(move |tooth| {
            tooth
                .procedures
                .iter()
                .filter(move |p| p.stage == stage_number)
                .map(move |p| (tooth.tooth_number, p))
        })
    }

    /// Procedures that still need doing.
    pub fn open_procedures(&self) -> impl Iterator<Item = (ToothNumber, &PlannedProcedure)> {
        self.teeth.iter().flat_map(|tooth| {
            tooth
                .procedures
                .iter()
                .filter(|p| !p.is_completed())
                .map(move |p| (tooth.tooth_number, p))
        })
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Definition of a new plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub plan_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub teeth: Vec<ToothPlanInput>,
    #[serde(default)]
    pub stages: Vec<StageInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToothPlanInput {
    pub tooth_number: ToothNumber,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub procedures: Vec<PlannedProcedureInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedProcedureInput {
    pub name: String,
    pub surface: Surface,
    #[serde(default = "first_stage")]
    pub stage: u32,
    #[serde(default)]
    pub status: ProcedureStatus,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

fn first_stage() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageInput {
    pub stage_name: String,
    pub description: Option<String>,
    pub scheduled_date: Option<String>,
}

/// Stage appended to an existing plan together with its work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewStage {
    pub stage_name: String,
    pub description: Option<String>,
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub tooth_surface_procedures: Vec<ToothSurfaceProcedures>,
}

/// Points at one planned procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureRef {
    pub tooth_number: ToothNumber,
    pub procedure_name: String,
    pub surface: Surface,
    pub stage_number: u32,
}

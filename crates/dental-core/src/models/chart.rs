//! Dental chart models: per-tooth records and their procedure log.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::tooth::{EntryKind, ProcedureStatus, Surface, ToothNumber};

/// One line in a tooth's append-only procedure log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureEntry {
    pub entry_id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    pub surface: Surface,
    pub status: ProcedureStatus,
    pub date: String,
    pub performed_by: Option<String>,
    /// Visits that touched this entry, in first-touch order
    #[serde(default)]
    pub visit_ids: Vec<String>,
    pub treatment_plan_id: Option<String>,
    /// Charged amount, only once completed
    pub cost: Option<f64>,
    /// Quoted amount, only while not completed
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

impl ProcedureEntry {
    pub fn new(kind: EntryKind, name: String, surface: Surface, status: ProcedureStatus) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            kind,
            name,
            surface,
            status,
            date: chrono::Utc::now().to_rfc3339(),
            performed_by: None,
            visit_ids: Vec::new(),
            treatment_plan_id: None,
            cost: None,
            estimated_cost: None,
            notes: None,
        }
    }

    /// Identity of a live entry on its tooth.
    pub fn key(&self) -> EntryKey {
        EntryKey {
            kind: self.kind,
            name: self.name.clone(),
            surface: self.surface,
            treatment_plan_id: self.treatment_plan_id.clone(),
        }
    }

    /// Legacy composite key (`type-name-surface-status-treatmentPlanId`).
    pub fn legacy_dedup_key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.kind.as_str(),
            self.name,
            self.surface,
            match self.status {
                ProcedureStatus::Planned => "planned",
                ProcedureStatus::InProgress => "in-progress",
                ProcedureStatus::Completed => "completed",
            },
            self.treatment_plan_id.as_deref().unwrap_or("")
        )
    }

    pub fn add_visit(&mut self, visit_id: Option<&str>) {
        if let Some(visit_id) = visit_id {
            if !self.visit_ids.iter().any(|v| v == visit_id) {
                self.visit_ids.push(visit_id.to_string());
            }
        }
    }

    pub fn touched_in(&self, visit_id: Option<&str>) -> bool {
        visit_id.is_some_and(|v| self.visit_ids.iter().any(|id| id == v))
    }

    /// Flip to completed; the estimate gives way to the charged cost.
    pub fn complete(&mut self, cost: Option<f64>, performed_by: &str, at: &str) {
        self.status = ProcedureStatus::Completed;
        self.estimated_cost = None;
        self.cost = Some(cost.unwrap_or(0.0));
        self.performed_by = Some(performed_by.to_string());
        self.date = at.to_string();
    }

    pub fn is_completed_treatment(&self) -> bool {
        self.kind == EntryKind::Treatment && self.status.is_completed()
    }
}

/// Lookup key enforcing one live entry per (kind, name, surface, plan).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub kind: EntryKind,
    pub name: String,
    pub surface: Surface,
    pub treatment_plan_id: Option<String>,
}

/// Clinical state of one tooth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToothRecord {
    pub tooth_number: ToothNumber,
    #[serde(default)]
    pub conditions: BTreeSet<String>,
    #[serde(default)]
    pub procedures: Vec<ProcedureEntry>,
    pub last_updated: Option<String>,
    pub last_updated_by: Option<String>,
    pub last_visit_id: Option<String>,
}

impl ToothRecord {
    pub fn new(tooth_number: ToothNumber) -> Self {
        Self {
            tooth_number,
            conditions: BTreeSet::new(),
            procedures: Vec::new(),
            last_updated: None,
            last_updated_by: None,
            last_visit_id: None,
        }
    }
}

/// Per-patient chart; teeth are kept sorted by number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "Vec<ToothRecord>", into = "Vec<ToothRecord>")]
pub struct DentalChart {
    teeth: Vec<ToothRecord>,
}

impl DentalChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teeth(&self) -> &[ToothRecord] {
        &self.teeth
    }

    pub fn into_teeth(self) -> Vec<ToothRecord> {
        self.teeth
    }

    pub fn tooth(&self, tooth_number: ToothNumber) -> Option<&ToothRecord> {
        self.teeth
            .binary_search_by_key(&tooth_number, |t| t.tooth_number)
            .ok()
            .map(|idx| &self.teeth[idx])
    }

    /// Tooth record, created lazily in sorted position.
    pub fn tooth_mut(&mut self, tooth_number: ToothNumber) -> &mut ToothRecord {
        let idx = match self
            .teeth
            .binary_search_by_key(&tooth_number, |t| t.tooth_number)
        {
            Ok(idx) => idx,
            Err(idx) => {
                self.teeth.insert(idx, ToothRecord::new(tooth_number));
                idx
            }
        };
        &mut self.teeth[idx]
    }

    /// Collapse duplicates left by older writers, keeping the first entry per
    /// legacy key. Returns how many entries were dropped.
    pub fn dedup_legacy(&mut self) -> usize {
        let mut dropped = 0;
        for tooth in &mut self.teeth {
            let mut seen = std::collections::HashSet::new();
            let before = tooth.procedures.len();
            tooth
                .procedures
                .retain(|entry| seen.insert(entry.legacy_dedup_key()));
            dropped += before - tooth.procedures.len();
        }
        dropped
    }

    /// Drop open treatment entries of `plan_id` that `withdrawn` selects.
    /// Completed entries always stay. Returns how many entries went.
    pub fn withdraw_planned<F>(&mut self, plan_id: &str, mut withdrawn: F) -> usize
    where
        F: FnMut(ToothNumber, &ProcedureEntry) -> bool,
    {
        let mut removed = 0;
        for tooth in &mut self.teeth {
            let tooth_number = tooth.tooth_number;
            let before = tooth.procedures.len();
            tooth.procedures.retain(|entry| {
                let open_for_plan = entry.kind == EntryKind::Treatment
                    && !entry.status.is_completed()
                    && entry.treatment_plan_id.as_deref() == Some(plan_id);
                !(open_for_plan && withdrawn(tooth_number, entry))
            });
            removed += before - tooth.procedures.len();
        }
        removed
    }
}

impl From<DentalChart> for Vec<ToothRecord> {
    fn from(chart: DentalChart) -> Self {
        chart.teeth
    }
}

impl From<Vec<ToothRecord>> for DentalChart {
    fn from(mut teeth: Vec<ToothRecord>) -> Self {
        teeth.sort_by_key(|t| t.tooth_number);
        Self { teeth }
    }
}

/// Work recorded against one tooth in a single write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToothWork {
    pub tooth_number: ToothNumber,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub surface_conditions: Vec<SurfaceConditions>,
    #[serde(default)]
    pub procedures: Vec<ProcedureInput>,
}

impl ToothWork {
    pub fn new(tooth_number: ToothNumber) -> Self {
        Self {
            tooth_number,
            conditions: Vec::new(),
            surface_conditions: Vec::new(),
            procedures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
            && self.surface_conditions.iter().all(|s| s.conditions.is_empty())
            && self.procedures.is_empty()
    }
}

/// Conditions observed on a specific surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceConditions {
    pub surface: Surface,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// A procedure as submitted by a doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureInput {
    pub name: String,
    pub surface: Surface,
    #[serde(default)]
    pub status: ProcedureStatus,
    pub cost: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

impl ProcedureInput {
    pub fn new(name: impl Into<String>, surface: Surface, status: ProcedureStatus) -> Self {
        Self {
            name: name.into(),
            surface,
            status,
            cost: None,
            estimated_cost: None,
            notes: None,
        }
    }
}

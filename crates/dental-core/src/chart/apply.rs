//! In-memory application of tooth work to a chart.

use std::collections::HashSet;

use tracing::debug;

use super::conflict::{conflict_in_record, conflict_with_entry};
use crate::error::{DentalError, DentalResult};
use crate::models::{
    DentalChart, EntryKey, EntryKind, ProcedureEntry, ProcedureInput, ProcedureStatus, Surface,
    ToothNumber, ToothRecord, ToothWork,
};

/// A plan procedure's place: tooth, surface and ASCII-lowercased name.
pub type ProcedureSlot = (ToothNumber, Surface, String);

/// Whether new completed treatments are checked against the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Enforce,
    /// Record as submitted (imports, corrections)
    Skip,
}

/// Who is writing, and on behalf of which visit and plan.
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub visit_id: Option<String>,
    pub doctor_id: String,
    pub treatment_plan_id: Option<String>,
    /// When set, only procedures in these slots carry the plan tag
    pub plan_slots: Option<HashSet<ProcedureSlot>>,
    pub conflicts: ConflictPolicy,
}

impl WorkContext {
    pub fn new(doctor_id: impl Into<String>) -> Self {
        Self {
            visit_id: None,
            doctor_id: doctor_id.into(),
            treatment_plan_id: None,
            plan_slots: None,
            conflicts: ConflictPolicy::Enforce,
        }
    }

    pub fn with_visit(mut self, visit_id: impl Into<String>) -> Self {
        self.visit_id = Some(visit_id.into());
        self
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.treatment_plan_id = Some(plan_id.into());
        self
    }

    /// Tag procedures the plan carries; anything else is charted untagged.
    pub fn with_plan_slots(
        mut self,
        plan_id: impl Into<String>,
        slots: HashSet<ProcedureSlot>,
    ) -> Self {
        self.treatment_plan_id = Some(plan_id.into());
        self.plan_slots = Some(slots);
        self
    }

    pub fn with_conflicts(mut self, conflicts: ConflictPolicy) -> Self {
        self.conflicts = conflicts;
        self
    }

    fn plan_tag(&self, tooth_number: ToothNumber, surface: Surface, name: &str) -> Option<String> {
        let plan_id = self.treatment_plan_id.as_ref()?;
        match &self.plan_slots {
            Some(slots) => slots
                .contains(&(tooth_number, surface, name.to_ascii_lowercase()))
                .then(|| plan_id.clone()),
            None => Some(plan_id.clone()),
        }
    }
}

/// Counts of what one `apply_work` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkSummary {
    pub appended: usize,
    pub transitioned: usize,
    pub merged: usize,
}

enum Applied {
    Appended,
    Transitioned,
    Merged,
}

impl DentalChart {
    /// Apply every tooth's conditions and procedures in order.
    ///
    /// Stops at the first error; the caller discards the chart in that case.
    pub fn apply_work(
        &mut self,
        works: &[ToothWork],
        ctx: &WorkContext,
        now: &str,
    ) -> DentalResult<WorkSummary> {
        let mut summary = WorkSummary::default();

        for work in works {
            if work.is_empty() {
                continue;
            }
            let record = self.tooth_mut(work.tooth_number);

            for condition in &work.conditions {
                record_condition(record, condition, Surface::Entire, ctx, now);
            }
            for surface_conditions in &work.surface_conditions {
                for condition in &surface_conditions.conditions {
                    record_condition(record, condition, surface_conditions.surface, ctx, now);
                }
            }

            for input in &work.procedures {
                match apply_procedure(record, input, ctx, now)? {
                    Applied::Appended => summary.appended += 1,
                    Applied::Transitioned => summary.transitioned += 1,
                    Applied::Merged => summary.merged += 1,
                }
            }

            record.last_updated = Some(now.to_string());
            record.last_updated_by = Some(ctx.doctor_id.clone());
            if ctx.visit_id.is_some() {
                record.last_visit_id = ctx.visit_id.clone();
            }
        }

        debug!(
            appended = summary.appended,
            transitioned = summary.transitioned,
            merged = summary.merged,
            "Applied tooth work"
        );
        Ok(summary)
    }
}

fn record_condition(
    record: &mut ToothRecord,
    condition: &str,
    surface: Surface,
    ctx: &WorkContext,
    now: &str,
) {
    let name = condition.trim();
    if name.is_empty() {
        return;
    }
    record.conditions.insert(name.to_string());

    let visit_id = ctx.visit_id.as_deref();
    if let Some(existing) = record
        .procedures
        .iter_mut()
        .find(|e| e.kind == EntryKind::Condition && e.surface == surface && e.name == name)
    {
        existing.add_visit(visit_id);
        return;
    }

    let mut entry = ProcedureEntry::new(
        EntryKind::Condition,
        name.to_string(),
        surface,
        ProcedureStatus::Completed,
    );
    entry.date = now.to_string();
    entry.performed_by = Some(ctx.doctor_id.clone());
    entry.add_visit(visit_id);
    record.procedures.push(entry);
}

fn apply_procedure(
    record: &mut ToothRecord,
    input: &ProcedureInput,
    ctx: &WorkContext,
    now: &str,
) -> DentalResult<Applied> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(DentalError::validation(
            "procedures.name",
            format!("procedure on tooth {} has no name", record.tooth_number),
        ));
    }

    let key = EntryKey {
        kind: EntryKind::Treatment,
        name: name.to_string(),
        surface: input.surface,
        treatment_plan_id: ctx.plan_tag(record.tooth_number, input.surface, name),
    };
    let visit_id = ctx.visit_id.as_deref();
    let tooth_number = record.tooth_number;

    if let Some(existing) = record.procedures.iter_mut().find(|e| e.key() == key) {
        if existing.status != input.status {
            if input.status.is_completed() {
                existing.complete(input.cost, &ctx.doctor_id, now);
            } else if !existing.status.is_completed() {
                // planned -> in-progress only; never back
                if input.status == ProcedureStatus::InProgress {
                    existing.status = ProcedureStatus::InProgress;
                }
                if input.estimated_cost.is_some() {
                    existing.estimated_cost = input.estimated_cost;
                }
            }
            if input.notes.is_some() {
                existing.notes = input.notes.clone();
            }
            existing.add_visit(visit_id);
            return Ok(Applied::Transitioned);
        }

        if existing.status.is_completed()
            && ctx.conflicts == ConflictPolicy::Enforce
            && !existing.touched_in(visit_id)
        {
            return Err(conflict_with_entry(tooth_number, input.surface, existing).into());
        }

        if input.notes.is_some() {
            existing.notes = input.notes.clone();
        }
        if !existing.status.is_completed() && input.estimated_cost.is_some() {
            existing.estimated_cost = input.estimated_cost;
        }
        existing.add_visit(visit_id);
        return Ok(Applied::Merged);
    }

    if input.status.is_completed() && ctx.conflicts == ConflictPolicy::Enforce {
        if let Some(conflict) = conflict_in_record(record, input.surface) {
            return Err(conflict.into());
        }
    }

    let mut entry =
        ProcedureEntry::new(EntryKind::Treatment, key.name, input.surface, input.status);
    entry.treatment_plan_id = key.treatment_plan_id;
    entry.notes = input.notes.clone();
    entry.date = now.to_string();
    if input.status.is_completed() {
        entry.complete(input.cost, &ctx.doctor_id, now);
    } else {
        entry.estimated_cost = input.estimated_cost.or(input.cost);
    }
    entry.add_visit(visit_id);
    record.procedures.push(entry);
    Ok(Applied::Appended)
}

//! Treatment plan state machine.
//!
//! All operations are pure mutations of a [`TreatmentPlan`] taking `now` as
//! an RFC 3339 timestamp. Each successful mutation finishes with
//! [`TreatmentPlan::refresh`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::status::{derive_plan_status, derive_stage_status, StageProgress};
use crate::chart::ProcedureSlot;
use crate::error::{DentalError, DentalResult};
use crate::models::{
    NewPlan, NewStage, PlanStatus, PlannedProcedure, Priority, ProcedureInput, ProcedureRef,
    ProcedureStatus, Stage, StageStatus, Surface, SurfaceProcedures, ToothNumber, ToothPlan,
    ToothSurfaceProcedures, ToothWork, TreatmentPlan,
};

/// A planned procedure that a mutation flipped to completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedProcedure {
    pub tooth_number: ToothNumber,
    pub name: String,
    pub surface: Surface,
    pub stage: u32,
    pub estimated_cost: Option<f64>,
}

impl TreatmentPlan {
    /// Validate a plan definition and build the plan it describes.
    pub fn build(
        patient_id: &str,
        clinic_id: &str,
        doctor_id: &str,
        definition: NewPlan,
        visit_id: Option<&str>,
        now: &str,
    ) -> DentalResult<TreatmentPlan> {
        let plan_name = definition.plan_name.trim();
        if plan_name.is_empty() {
            return Err(DentalError::validation("planName", "must not be empty"));
        }
        if definition.stages.is_empty() {
            return Err(DentalError::validation("stages", "a plan needs at least one stage"));
        }

        let mut plan = TreatmentPlan::new(
            patient_id.to_string(),
            clinic_id.to_string(),
            doctor_id.to_string(),
            plan_name.to_string(),
        );
        plan.description = trimmed(definition.description);
        plan.created_at = now.to_string();

        for (idx, input) in definition.stages.into_iter().enumerate() {
            let stage_name = input.stage_name.trim();
            if stage_name.is_empty() {
                return Err(DentalError::validation(
                    format!("stages[{}].stageName", idx),
                    "must not be empty",
                ));
            }
            plan.stages.push(empty_stage(
                idx as u32 + 1,
                stage_name,
                trimmed(input.description),
                input.scheduled_date,
            ));
        }

        let stage_count = plan.stages.len() as u32;
        for tooth in definition.teeth {
            for procedure in tooth.procedures {
                if procedure.stage == 0 || procedure.stage > stage_count {
                    return Err(DentalError::validation(
                        "teeth.procedures.stage",
                        format!(
                            "stage {} on tooth {} is outside 1..={}",
                            procedure.stage, tooth.tooth_number, stage_count
                        ),
                    ));
                }
                let name = procedure.name.trim();
                if name.is_empty() {
                    return Err(DentalError::validation(
                        "teeth.procedures.name",
                        format!("procedure on tooth {} has no name", tooth.tooth_number),
                    ));
                }

                let tooth_plan = plan.tooth_plan_mut(tooth.tooth_number, tooth.priority);
                if tooth_plan
                    .procedures
                    .iter()
                    .any(|p| p.stage == procedure.stage && p.matches(name, procedure.surface))
                {
                    return Err(DentalError::validation(
                        "teeth.procedures",
                        format!(
                            "{} on tooth {} {} is listed twice in stage {}",
                            name, tooth.tooth_number, procedure.surface, procedure.stage
                        ),
                    ));
                }

                let mut planned = planned_procedure(name, procedure.surface, procedure.stage);
                planned.estimated_cost = procedure.estimated_cost;
                planned.notes = trimmed(procedure.notes);
                match procedure.status {
                    ProcedureStatus::Completed => planned.complete(visit_id, doctor_id, now),
                    status => planned.status = status,
                }
                tooth_plan.procedures.push(planned);
            }
        }

        plan.refresh(now);
        Ok(plan)
    }

    /// Recompute everything derived from the procedure list.
    pub fn refresh(&mut self, now: &str) {
        for tooth in &mut self.teeth {
            tooth.is_completed =
                !tooth.procedures.is_empty() && tooth.procedures.iter().all(|p| p.is_completed());
        }

        let summaries: Vec<Vec<ToothSurfaceProcedures>> = self
            .stages
            .iter()
            .map(|stage| self.stage_summary(stage.stage_number))
            .collect();

        let mut stage_statuses = Vec::with_capacity(self.stages.len());
        for (idx, summary) in summaries.into_iter().enumerate() {
            let stage_number = self.stages[idx].stage_number;
            let (total, completed) = self
                .stage_procedures(stage_number)
                .fold((0, 0), |(total, done), (_, p)| {
                    (total + 1, done + usize::from(p.is_completed()))
                });

            let stage = &mut self.stages[idx];
            stage.tooth_surface_procedures = summary;
            stage.status = derive_stage_status(StageProgress {
                total,
                completed,
                started: stage.started_at.is_some(),
                closed: total == 0 && stage.completed_at.is_some(),
            });
            match stage.status {
                StageStatus::Completed => {
                    stage.completed_at.get_or_insert_with(|| now.to_string());
                    stage.started_at.get_or_insert_with(|| now.to_string());
                }
                StageStatus::InProgress => {
                    stage.completed_at = None;
                    stage.started_at.get_or_insert_with(|| now.to_string());
                }
                StageStatus::Pending => stage.completed_at = None,
            }
            stage_statuses.push(stage.status);
        }

        self.status = derive_plan_status(self.status, &stage_statuses);
        self.current_stage = self
            .stages
            .iter()
            .find(|s| s.status != StageStatus::Completed)
            .map(|s| s.stage_number)
            .unwrap_or(self.stages.len().max(1) as u32);

        match self.status {
            PlanStatus::Ongoing => {
                self.started_at.get_or_insert_with(|| now.to_string());
            }
            PlanStatus::Completed => {
                self.started_at.get_or_insert_with(|| now.to_string());
                self.completed_at.get_or_insert_with(|| now.to_string());
            }
            PlanStatus::Draft | PlanStatus::Cancelled => {}
        }
        self.updated_at = now.to_string();
    }

    /// Complete every procedure in a stage and close it.
    pub fn complete_stage(
        &mut self,
        stage_number: u32,
        visit_id: Option<&str>,
        doctor_id: &str,
        now: &str,
    ) -> DentalResult<Vec<CompletedProcedure>> {
        self.ensure_open()?;
        let stage = self.existing_stage(stage_number)?;
        if stage.status == StageStatus::Completed {
            return Err(DentalError::invalid_state(format!(
                "stage {} is already completed",
                stage_number
            )));
        }

        let mut completed = Vec::new();
        for tooth in &mut self.teeth {
            for procedure in &mut tooth.procedures {
                if procedure.stage == stage_number && !procedure.is_completed() {
                    procedure.complete(visit_id, doctor_id, now);
                    completed.push(completed_procedure(tooth.tooth_number, procedure));
                }
            }
        }

        if let Some(stage) = self.stages.iter_mut().find(|s| s.stage_number == stage_number) {
            stage.started_at.get_or_insert_with(|| now.to_string());
            stage.completed_at = Some(now.to_string());
        }

        self.refresh(now);
        Ok(completed)
    }

    /// Complete individual procedures; stage status follows from the mix.
    pub fn complete_procedures(
        &mut self,
        refs: &[ProcedureRef],
        visit_id: Option<&str>,
        doctor_id: &str,
        now: &str,
    ) -> DentalResult<Vec<CompletedProcedure>> {
        self.ensure_open()?;
        for r in refs {
            if r.procedure_name.trim().is_empty() {
                return Err(DentalError::validation("procedureName", "must not be empty"));
            }
            if r.stage_number == 0 {
                return Err(DentalError::validation("stageNumber", "stages are numbered from 1"));
            }
            self.existing_stage(r.stage_number)?;
        }

        let mut completed = Vec::new();
        for r in refs {
            let name = r.procedure_name.trim();
            let tooth = self
                .teeth
                .iter_mut()
                .find(|t| t.tooth_number == r.tooth_number)
                .ok_or_else(|| {
                    DentalError::not_found("Tooth plan", format!("tooth {}", r.tooth_number))
                })?;
            let procedure = tooth
                .procedures
                .iter_mut()
                .find(|p| p.stage == r.stage_number && p.matches(name, r.surface))
                .ok_or_else(|| {
                    DentalError::not_found(
                        "Planned procedure",
                        format!(
                            "{} on tooth {} {} in stage {}",
                            name, r.tooth_number, r.surface, r.stage_number
                        ),
                    )
                })?;

            if !procedure.is_completed() {
                procedure.complete(visit_id, doctor_id, now);
                completed.push(completed_procedure(tooth.tooth_number, procedure));
            }
        }

        self.refresh(now);
        Ok(completed)
    }

    /// Mark a stage as started without completing anything.
    pub fn start_stage(&mut self, stage_number: u32, now: &str) -> DentalResult<()> {
        self.ensure_open()?;
        let stage = self.existing_stage(stage_number)?;
        if stage.status == StageStatus::Completed {
            return Err(DentalError::invalid_state(format!(
                "stage {} is already completed",
                stage_number
            )));
        }

        if let Some(stage) = self.stages.iter_mut().find(|s| s.stage_number == stage_number) {
            stage.started_at.get_or_insert_with(|| now.to_string());
        }
        self.refresh(now);
        Ok(())
    }

    /// Append a stage with its work; returns the new stage number.
    pub fn add_stage(&mut self, new_stage: NewStage, now: &str) -> DentalResult<u32> {
        self.ensure_open()?;
        let stage_name = new_stage.stage_name.trim();
        if stage_name.is_empty() {
            return Err(DentalError::validation("stageName", "must not be empty"));
        }

        let stage_number = self.stages.len() as u32 + 1;
        let mut seen = HashSet::new();
        let mut additions = Vec::new();
        for tooth in &new_stage.tooth_surface_procedures {
            for group in &tooth.surface_procedures {
                for name in &group.procedure_names {
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(DentalError::validation(
                            "toothSurfaceProcedures.procedureNames",
                            format!("procedure on tooth {} has no name", tooth.tooth_number),
                        ));
                    }
                    if seen.insert((tooth.tooth_number, group.surface, name.to_lowercase())) {
                        additions.push((tooth.tooth_number, group.surface, name.to_string()));
                    }
                }
            }
        }

        self.stages.push(empty_stage(
            stage_number,
            stage_name,
            trimmed(new_stage.description),
            new_stage.scheduled_date,
        ));
        for (tooth_number, surface, name) in additions {
            self.tooth_plan_mut(tooth_number, Priority::default())
                .procedures
                .push(planned_procedure(&name, surface, stage_number));
        }

        self.refresh(now);
        Ok(stage_number)
    }

    /// Remove a stage, renumbering the later ones.
    pub fn remove_stage(&mut self, stage_number: u32, now: &str) -> DentalResult<()> {
        self.ensure_open()?;
        let stage = self.existing_stage(stage_number)?;
        if stage.status == StageStatus::Completed {
            return Err(DentalError::invalid_state(format!(
                "stage {} is completed",
                stage_number
            )));
        }
        if self.stage_procedures(stage_number).any(|(_, p)| p.is_completed()) {
            return Err(DentalError::invalid_state(format!(
                "stage {} has completed procedures",
                stage_number
            )));
        }
        if self.stages.len() == 1 {
            return Err(DentalError::invalid_state(
                "a plan needs at least one stage; cancel the plan instead",
            ));
        }

        for tooth in &mut self.teeth {
            tooth.procedures.retain(|p| p.stage != stage_number);
            for procedure in &mut tooth.procedures {
                if procedure.stage > stage_number {
                    procedure.stage -= 1;
                }
            }
        }
        self.teeth.retain(|t| !t.procedures.is_empty());

        self.stages.retain(|s| s.stage_number != stage_number);
        for stage in &mut self.stages {
            if stage.stage_number > stage_number {
                stage.stage_number -= 1;
            }
        }

        self.refresh(now);
        Ok(())
    }

    /// Remove one planned procedure, dropping the tooth if nothing is left.
    pub fn remove_procedure(
        &mut self,
        tooth_number: ToothNumber,
        procedure_name: &str,
        surface: Surface,
        now: &str,
    ) -> DentalResult<PlannedProcedure> {
        self.ensure_open()?;
        let name = procedure_name.trim();
        if name.is_empty() {
            return Err(DentalError::validation("procedureName", "must not be empty"));
        }

        let tooth_idx = self
            .teeth
            .iter()
            .position(|t| t.tooth_number == tooth_number)
            .ok_or_else(|| {
                DentalError::not_found("Tooth plan", format!("tooth {}", tooth_number))
            })?;
        let proc_idx = self.teeth[tooth_idx]
            .procedures
            .iter()
            .position(|p| p.matches(name, surface))
            .ok_or_else(|| {
                DentalError::not_found(
                    "Planned procedure",
                    format!("{} on tooth {} {}", name, tooth_number, surface),
                )
            })?;

        let procedure = &self.teeth[tooth_idx].procedures[proc_idx];
        if procedure.is_completed() {
            return Err(DentalError::invalid_state(format!(
                "{} on tooth {} is already completed",
                name, tooth_number
            )));
        }
        if self
            .stage(procedure.stage)
            .is_some_and(|s| s.status == StageStatus::Completed)
        {
            return Err(DentalError::invalid_state(format!(
                "stage {} is completed",
                procedure.stage
            )));
        }

        let removed = self.teeth[tooth_idx].procedures.remove(proc_idx);
        if self.teeth[tooth_idx].procedures.is_empty() {
            self.teeth.remove(tooth_idx);
        }

        self.refresh(now);
        Ok(removed)
    }

    /// Force-complete every procedure, tooth and stage.
    pub fn finish(&mut self, doctor_id: &str, now: &str) -> DentalResult<Vec<CompletedProcedure>> {
        match self.status {
            PlanStatus::Completed => {
                return Err(DentalError::invalid_state("plan is already completed"))
            }
            PlanStatus::Cancelled => return Err(DentalError::invalid_state("plan is cancelled")),
            PlanStatus::Draft | PlanStatus::Ongoing => {}
        }

        let mut completed = Vec::new();
        for tooth in &mut self.teeth {
            for procedure in &mut tooth.procedures {
                if !procedure.is_completed() {
                    procedure.complete(None, doctor_id, now);
                    completed.push(completed_procedure(tooth.tooth_number, procedure));
                }
            }
        }
        for stage in &mut self.stages {
            stage.started_at.get_or_insert_with(|| now.to_string());
            stage.completed_at.get_or_insert_with(|| now.to_string());
        }

        self.refresh(now);
        self.status = PlanStatus::Completed;
        self.completed_at = Some(now.to_string());
        self.current_stage = self.stages.len().max(1) as u32;
        Ok(completed)
    }

    /// Cancel the plan. Terminal.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        doctor_id: &str,
        now: &str,
    ) -> DentalResult<()> {
        match self.status {
            PlanStatus::Completed => {
                return Err(DentalError::invalid_state("a completed plan cannot be cancelled"))
            }
            PlanStatus::Cancelled => {
                return Err(DentalError::invalid_state("plan is already cancelled"))
            }
            PlanStatus::Draft | PlanStatus::Ongoing => {}
        }

        self.status = PlanStatus::Cancelled;
        self.cancellation_reason = trimmed(reason);
        self.cancelled_at = Some(now.to_string());
        self.cancelled_by = Some(doctor_id.to_string());
        self.refresh(now);
        Ok(())
    }

    /// Open procedures as planned chart work tagged for this plan.
    pub fn planned_chart_work(&self) -> Vec<ToothWork> {
        self.open_chart_work(|_| true)
    }

    /// Open procedures of one stage as planned chart work.
    pub fn stage_chart_work(&self, stage_number: u32) -> Vec<ToothWork> {
        self.open_chart_work(|p| p.stage == stage_number)
    }

    /// Whether the plan still carries this procedure on this tooth.
    pub fn contains_procedure(
        &self,
        tooth_number: ToothNumber,
        name: &str,
        surface: Surface,
    ) -> bool {
        let name = name.trim();
        self.teeth
            .iter()
            .filter(|t| t.tooth_number == tooth_number)
            .flat_map(|t| &t.procedures)
            .any(|p| p.matches(name, surface))
    }

    /// Slots of every procedure in the plan, for tagging chart work.
    pub fn procedure_slots(&self) -> HashSet<ProcedureSlot> {
        self.teeth
            .iter()
            .flat_map(|t| {
                t.procedures
                    .iter()
                    .map(move |p| (t.tooth_number, p.surface, p.name.to_ascii_lowercase()))
            })
            .collect()
    }

    fn open_chart_work(&self, include: impl Fn(&PlannedProcedure) -> bool) -> Vec<ToothWork> {
        self.teeth
            .iter()
            .filter_map(|tooth| {
                let procedures: Vec<ProcedureInput> = tooth
                    .procedures
                    .iter()
                    .filter(|p| !p.is_completed() && include(p))
                    .map(|p| {
                        let mut input = ProcedureInput::new(
                            p.name.clone(),
                            p.surface,
                            ProcedureStatus::Planned,
                        );
                        input.estimated_cost = p.estimated_cost;
                        input.notes = p.notes.clone();
                        input
                    })
                    .collect();
                (!procedures.is_empty()).then(|| {
                    let mut work = ToothWork::new(tooth.tooth_number);
                    work.procedures = procedures;
                    work
                })
            })
            .collect()
    }

    fn ensure_open(&self) -> DentalResult<()> {
        if self.status.is_closed() {
            return Err(DentalError::invalid_state(format!(
                "plan {} is {}",
                self.plan_id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn existing_stage(&self, stage_number: u32) -> DentalResult<&Stage> {
        self.stage(stage_number).ok_or_else(|| {
            DentalError::not_found("Stage", format!("{} of plan {}", stage_number, self.plan_id))
        })
    }

    fn tooth_plan_mut(&mut self, tooth_number: ToothNumber, priority: Priority) -> &mut ToothPlan {
        let idx = match self.teeth.iter().position(|t| t.tooth_number == tooth_number) {
            Some(idx) => idx,
            None => {
                self.teeth.push(ToothPlan {
                    tooth_number,
                    priority,
                    is_completed: false,
                    procedures: Vec::new(),
                });
                self.teeth.len() - 1
            }
        };
        &mut self.teeth[idx]
    }

    fn stage_summary(&self, stage_number: u32) -> Vec<ToothSurfaceProcedures> {
        let mut by_tooth: BTreeMap<ToothNumber, Vec<SurfaceProcedures>> = BTreeMap::new();
        for (tooth_number, procedure) in self.stage_procedures(stage_number) {
            let groups = by_tooth.entry(tooth_number).or_default();
            match groups.iter_mut().find(|g| g.surface == procedure.surface) {
                Some(group) => group.procedure_names.push(procedure.name.clone()),
                None => groups.push(SurfaceProcedures {
                    surface: procedure.surface,
                    procedure_names: vec![procedure.name.clone()],
                }),
            }
        }

        by_tooth
            .into_iter()
            .map(|(tooth_number, surface_procedures)| ToothSurfaceProcedures {
                tooth_number,
                surface_procedures,
            })
            .collect()
    }
}

/// Completed plan procedures as chart work, grouped by tooth.
pub fn completed_chart_work(completed: &[CompletedProcedure]) -> Vec<ToothWork> {
    let mut by_tooth: BTreeMap<ToothNumber, ToothWork> = BTreeMap::new();
    for procedure in completed {
        let mut input = ProcedureInput::new(
            procedure.name.clone(),
            procedure.surface,
            ProcedureStatus::Completed,
        );
        input.cost = procedure.estimated_cost;
        by_tooth
            .entry(procedure.tooth_number)
            .or_insert_with(|| ToothWork::new(procedure.tooth_number))
            .procedures
            .push(input);
    }
    by_tooth.into_values().collect()
}

fn empty_stage(
    stage_number: u32,
    stage_name: &str,
    description: Option<String>,
    scheduled_date: Option<String>,
) -> Stage {
    Stage {
        stage_number,
        stage_name: stage_name.to_string(),
        description,
        status: StageStatus::Pending,
        scheduled_date,
        tooth_surface_procedures: Vec::new(),
        started_at: None,
        completed_at: None,
    }
}

fn planned_procedure(name: &str, surface: Surface, stage: u32) -> PlannedProcedure {
    PlannedProcedure {
        name: name.to_string(),
        surface,
        stage,
        status: ProcedureStatus::Planned,
        estimated_cost: None,
        notes: None,
        completed_at: None,
        completed_in_visit_id: None,
        performed_by: None,
    }
}

fn completed_procedure(
    tooth_number: ToothNumber,
    procedure: &PlannedProcedure,
) -> CompletedProcedure {
    CompletedProcedure {
        tooth_number,
        name: procedure.name.clone(),
        surface: procedure.surface,
        stage: procedure.stage,
        estimated_cost: procedure.estimated_cost,
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlannedProcedureInput, StageInput, ToothPlanInput};

    const NOW: &str = "2026-03-01T09:00:00+00:00";
    const LATER: &str = "2026-04-01T09:00:00+00:00";

    fn tooth(n: i64) -> ToothNumber {
        ToothNumber::new(n).unwrap()
    }

    fn stage(name: &str) -> StageInput {
        StageInput {
            stage_name: name.into(),
            description: None,
            scheduled_date: None,
        }
    }

    fn procedure(name: &str, surface: Surface, stage: u32) -> PlannedProcedureInput {
        PlannedProcedureInput {
            name: name.into(),
            surface,
            stage,
            status: ProcedureStatus::Planned,
            estimated_cost: Some(100.0),
            notes: None,
        }
    }

    fn tooth_input(n: i64, procedures: Vec<PlannedProcedureInput>) -> ToothPlanInput {
        ToothPlanInput {
            tooth_number: tooth(n),
            priority: Priority::Medium,
            procedures,
        }
    }

    /// Three stages: stage 1 has three procedures, stage 2 one, stage 3 one.
    fn three_stage_plan() -> TreatmentPlan {
        let definition = NewPlan {
            plan_name: "Full rehab".into(),
            description: None,
            teeth: vec![
                tooth_input(
                    14,
                    vec![
                        procedure("Filling", Surface::Occlusal, 1),
                        procedure("Filling", Surface::Mesial, 1),
                        procedure("Crown", Surface::Entire, 3),
                    ],
                ),
                tooth_input(
                    19,
                    vec![
                        procedure("Scaling", Surface::Buccal, 1),
                        procedure("Root canal", Surface::Entire, 2),
                    ],
                ),
            ],
            stages: vec![stage("Hygiene"), stage("Endo"), stage("Prosthetics")],
        };
        TreatmentPlan::build("pat-1", "clinic-1", "doc-1", definition, None, NOW).unwrap()
    }

    fn reference(n: i64, name: &str, surface: Surface, stage: u32) -> ProcedureRef {
        ProcedureRef {
            tooth_number: tooth(n),
            procedure_name: name.into(),
            surface,
            stage_number: stage,
        }
    }

    #[test]
    fn test_build_derives_summaries_and_status() {
        let plan = three_stage_plan();

        assert_eq!(plan.status, PlanStatus::Draft);
        assert_eq!(plan.current_stage, 1);
        let numbers: Vec<u32> = plan.stages.iter().map(|s| s.stage_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let summary = &plan.stage(1).unwrap().tooth_surface_procedures;
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].tooth_number, tooth(14));
        assert_eq!(summary[0].surface_procedures.len(), 2);
        assert!(plan.stages.iter().all(|s| s.status == StageStatus::Pending));
    }

    #[test]
    fn test_build_rejects_bad_definitions() {
        let no_stages = NewPlan {
            plan_name: "x".into(),
            description: None,
            teeth: vec![],
            stages: vec![],
        };
        assert!(matches!(
            TreatmentPlan::build("p", "c", "d", no_stages, None, NOW),
            Err(DentalError::Validation { .. })
        ));

        let blank_stage = NewPlan {
            plan_name: "x".into(),
            description: None,
            teeth: vec![],
            stages: vec![stage("  ")],
        };
        assert!(matches!(
            TreatmentPlan::build("p", "c", "d", blank_stage, None, NOW),
            Err(DentalError::Validation { .. })
        ));

        let out_of_range = NewPlan {
            plan_name: "x".into(),
            description: None,
            teeth: vec![tooth_input(3, vec![procedure("Filling", Surface::Distal, 2)])],
            stages: vec![stage("Only")],
        };
        assert!(matches!(
            TreatmentPlan::build("p", "c", "d", out_of_range, None, NOW),
            Err(DentalError::Validation { .. })
        ));
    }

    #[test]
    fn test_stage_progression() {
        let mut plan = three_stage_plan();

        let filling = reference(14, "filling", Surface::Occlusal, 1);
        plan.complete_procedures(&[filling], Some("v1"), "doc-1", NOW)
            .unwrap();
        assert_eq!(plan.stage(1).unwrap().status, StageStatus::InProgress);
        assert_eq!(plan.status, PlanStatus::Ongoing);
        assert_eq!(plan.started_at.as_deref(), Some(NOW));

        plan.complete_procedures(
            &[
                reference(14, "Filling", Surface::Mesial, 1),
                reference(19, "Scaling", Surface::Buccal, 1),
            ],
            Some("v1"),
            "doc-1",
            NOW,
        )
        .unwrap();
        assert_eq!(plan.stage(1).unwrap().status, StageStatus::Completed);
        assert_eq!(plan.current_stage, 2);
    }

    #[test]
    fn test_complete_stage_marks_procedures() {
        let mut plan = three_stage_plan();
        let completed = plan.complete_stage(2, Some("v7"), "doc-2", LATER).unwrap();

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].name, "Root canal");
        let procedure = plan
            .stage_procedures(2)
            .map(|(_, p)| p.clone())
            .next()
            .unwrap();
        assert_eq!(procedure.completed_in_visit_id.as_deref(), Some("v7"));
        assert_eq!(procedure.performed_by.as_deref(), Some("doc-2"));
        assert_eq!(plan.stage(2).unwrap().status, StageStatus::Completed);
        assert_eq!(plan.status, PlanStatus::Ongoing);
        assert_eq!(plan.current_stage, 1);

        assert!(matches!(
            plan.complete_stage(2, None, "doc-2", LATER),
            Err(DentalError::InvalidState(_))
        ));
    }

    #[test]
    fn test_completing_all_stages_completes_plan() {
        let mut plan = three_stage_plan();
        for n in 1..=3 {
            plan.complete_stage(n, Some("v1"), "doc-1", LATER).unwrap();
        }
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.completed_at.as_deref(), Some(LATER));
        assert!(plan.teeth.iter().all(|t| t.is_completed));
        assert_eq!(plan.current_stage, 3);
    }

    #[test]
    fn test_unknown_procedure_ref() {
        let mut plan = three_stage_plan();
        let err = plan
            .complete_procedures(&[reference(14, "Veneer", Surface::Buccal, 1)], None, "d", NOW)
            .unwrap_err();
        assert!(matches!(err, DentalError::NotFound { .. }));

        let err = plan
            .complete_procedures(&[reference(14, "Filling", Surface::Occlusal, 0)], None, "d", NOW)
            .unwrap_err();
        assert!(matches!(err, DentalError::Validation { .. }));

        let err = plan
            .complete_procedures(&[reference(14, "Filling", Surface::Occlusal, 9)], None, "d", NOW)
            .unwrap_err();
        assert!(matches!(err, DentalError::NotFound { entity: "Stage", .. }));
    }

    #[test]
    fn test_remove_stage_renumbers() {
        let mut plan = three_stage_plan();
        plan.remove_stage(2, LATER).unwrap();

        let numbers: Vec<u32> = plan.stages.iter().map(|s| s.stage_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(plan.stages[1].stage_name, "Prosthetics");

        let crown = plan
            .teeth
            .iter()
            .flat_map(|t| t.procedures.iter())
            .find(|p| p.name == "Crown")
            .unwrap();
        assert_eq!(crown.stage, 2);
        assert!(plan
            .teeth
            .iter()
            .flat_map(|t| t.procedures.iter())
            .all(|p| p.name != "Root canal"));
        assert_eq!(plan.current_stage, 1);
        assert_eq!(plan.stage(2).unwrap().tooth_surface_procedures[0].tooth_number, tooth(14));
    }

    #[test]
    fn test_remove_stage_with_completed_work_rejected() {
        let mut plan = three_stage_plan();
        plan.complete_procedures(&[reference(19, "Scaling", Surface::Buccal, 1)], None, "d", NOW)
            .unwrap();
        assert!(matches!(
            plan.remove_stage(1, LATER),
            Err(DentalError::InvalidState(_))
        ));
    }

    #[test]
    fn test_remove_stage_drops_empty_teeth() {
        let definition = NewPlan {
            plan_name: "Two".into(),
            description: None,
            teeth: vec![
                tooth_input(3, vec![procedure("Sealant", Surface::Occlusal, 1)]),
                tooth_input(30, vec![procedure("Sealant", Surface::Occlusal, 2)]),
            ],
            stages: vec![stage("First"), stage("Second")],
        };
        let mut plan = TreatmentPlan::build("p", "c", "d", definition, None, NOW).unwrap();
        plan.remove_stage(2, LATER).unwrap();

        assert_eq!(plan.teeth.len(), 1);
        assert_eq!(plan.teeth[0].tooth_number, tooth(3));
        assert!(matches!(plan.remove_stage(1, LATER), Err(DentalError::InvalidState(_))));
    }

    #[test]
    fn test_add_stage_appends_work() {
        let mut plan = three_stage_plan();
        let number = plan
            .add_stage(
                NewStage {
                    stage_name: "Whitening".into(),
                    description: None,
                    scheduled_date: Some("2026-06-01".into()),
                    tooth_surface_procedures: vec![ToothSurfaceProcedures {
                        tooth_number: tooth(8),
                        surface_procedures: vec![SurfaceProcedures {
                            surface: Surface::Buccal,
                            procedure_names: vec!["Bleaching".into(), "bleaching".into()],
                        }],
                    }],
                },
                LATER,
            )
            .unwrap();

        assert_eq!(number, 4);
        assert_eq!(plan.stage_procedures(4).count(), 1);
        assert_eq!(plan.stage(4).unwrap().tooth_surface_procedures.len(), 1);

        let work = plan.stage_chart_work(4);
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].tooth_number, tooth(8));
        assert_eq!(work[0].procedures[0].name, "Bleaching");
        assert_eq!(work[0].procedures[0].status, ProcedureStatus::Planned);
    }

    #[test]
    fn test_closed_plans_reject_structure_changes() {
        let mut plan = three_stage_plan();
        plan.cancel(Some("moved away".into()), "doc-1", LATER).unwrap();

        let new_stage = NewStage {
            stage_name: "Late".into(),
            description: None,
            scheduled_date: None,
            tooth_surface_procedures: vec![],
        };
        assert!(matches!(plan.add_stage(new_stage, LATER), Err(DentalError::InvalidState(_))));
        assert!(matches!(plan.remove_stage(3, LATER), Err(DentalError::InvalidState(_))));
        assert!(matches!(plan.finish("doc-1", LATER), Err(DentalError::InvalidState(_))));
        assert!(matches!(plan.cancel(None, "doc-1", LATER), Err(DentalError::InvalidState(_))));
        assert_eq!(plan.status, PlanStatus::Cancelled);
        assert_eq!(plan.cancellation_reason.as_deref(), Some("moved away"));
    }

    #[test]
    fn test_remove_procedure_cascades() {
        let mut plan = three_stage_plan();
        plan.remove_procedure(tooth(19), "Scaling", Surface::Buccal, LATER).unwrap();
        let stage_one = &plan.stage(1).unwrap().tooth_surface_procedures;
        assert_eq!(stage_one.len(), 1);

        plan.remove_procedure(tooth(19), "Root canal", Surface::Entire, LATER).unwrap();
        assert!(plan.teeth.iter().all(|t| t.tooth_number != tooth(19)));
        assert!(plan.stage(2).unwrap().tooth_surface_procedures.is_empty());
    }

    #[test]
    fn test_remove_completed_procedure_rejected() {
        let mut plan = three_stage_plan();
        plan.complete_procedures(&[reference(14, "Crown", Surface::Entire, 3)], None, "d", NOW)
            .unwrap();
        assert!(matches!(
            plan.remove_procedure(tooth(14), "Crown", Surface::Entire, LATER),
            Err(DentalError::InvalidState(_))
        ));
        assert!(matches!(
            plan.remove_procedure(tooth(2), "Crown", Surface::Entire, LATER),
            Err(DentalError::NotFound { .. })
        ));
    }

    #[test]
    fn test_finish_force_completes() {
        let mut plan = three_stage_plan();
        plan.complete_procedures(&[reference(19, "Scaling", Surface::Buccal, 1)], None, "d", NOW)
            .unwrap();
        let completed = plan.finish("doc-9", LATER).unwrap();

        assert_eq!(completed.len(), 4);
        assert!(completed
            .iter()
            .all(|p| !(p.tooth_number == tooth(19) && p.name == "Scaling")));

        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.current_stage, 3);
        assert!(plan.stages.iter().all(|s| s.status == StageStatus::Completed));
        assert!(plan
            .teeth
            .iter()
            .flat_map(|t| t.procedures.iter())
            .filter(|p| p.name != "Scaling")
            .all(|p| p.performed_by.as_deref() == Some("doc-9")));
        assert!(matches!(plan.finish("doc-9", LATER), Err(DentalError::InvalidState(_))));
        assert!(matches!(plan.cancel(None, "doc-9", LATER), Err(DentalError::InvalidState(_))));
    }

    #[test]
    fn test_start_stage() {
        let mut plan = three_stage_plan();
        plan.start_stage(2, NOW).unwrap();
        assert_eq!(plan.stage(2).unwrap().status, StageStatus::InProgress);
        assert_eq!(plan.status, PlanStatus::Ongoing);
        assert_eq!(plan.current_stage, 1);
    }

    #[test]
    fn test_chart_work_views() {
        let mut plan = three_stage_plan();
        let planned = plan.planned_chart_work();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].procedures.len(), 3);

        let completed = plan.complete_stage(1, Some("v1"), "doc-1", NOW).unwrap();
        let work = completed_chart_work(&completed);
        assert_eq!(work.len(), 2);
        assert!(work
            .iter()
            .flat_map(|w| w.procedures.iter())
            .all(|p| p.status == ProcedureStatus::Completed && p.cost == Some(100.0)));
        assert_eq!(plan.planned_chart_work().iter().map(|w| w.procedures.len()).sum::<usize>(), 2);
    }

    #[test]
    fn test_contains_procedure() {
        let mut plan = three_stage_plan();
        assert!(plan.contains_procedure(tooth(14), " crown ", Surface::Entire));
        assert!(!plan.contains_procedure(tooth(14), "Crown", Surface::Occlusal));
        assert!(!plan.contains_procedure(tooth(19), "Crown", Surface::Entire));

        plan.remove_stage(3, LATER).unwrap();
        assert!(!plan.contains_procedure(tooth(14), "Crown", Surface::Entire));

        let slots = plan.procedure_slots();
        assert_eq!(slots.len(), 4);
        assert!(slots.contains(&(tooth(19), Surface::Entire, "root canal".to_string())));
    }
}

//! Treatment plan persistence.

use tracing::{debug, info};

use super::engine::{completed_chart_work, CompletedProcedure};
use crate::chart::{ChartStore, ConflictPolicy, WorkContext};
use crate::db::Documents;
use crate::error::{DentalError, DentalResult};
use crate::models::{
    NewPlan, NewStage, ProcedureEntry, ProcedureRef, Surface, ToothNumber, TreatmentPlan,
};

/// Result of a completion call: the saved plan and what it completed.
#[derive(Debug, Clone)]
pub struct PlanUpdate {
    pub plan: TreatmentPlan,
    pub completed: Vec<CompletedProcedure>,
}

/// Loads a plan, runs one engine operation and saves it.
pub struct TreatmentPlanService<'c> {
    docs: Documents<'c>,
}

impl<'c> TreatmentPlanService<'c> {
    pub fn new(docs: Documents<'c>) -> Self {
        Self { docs }
    }

    pub fn get(&self, plan_id: &str) -> DentalResult<TreatmentPlan> {
        self.docs
            .get_plan(plan_id)?
            .ok_or_else(|| DentalError::not_found("Treatment plan", plan_id))
    }

    pub fn list_for_patient(&self, patient_id: &str) -> DentalResult<Vec<TreatmentPlan>> {
        if !self.docs.patient_exists(patient_id)? {
            return Err(DentalError::not_found("Patient", patient_id));
        }
        Ok(self.docs.list_plans_for_patient(patient_id)?)
    }

    /// Create a plan, link it to the patient and chart its open work as planned.
    pub fn create_plan(
        &self,
        patient_id: &str,
        clinic_id: &str,
        doctor_id: &str,
        definition: NewPlan,
        visit_id: Option<&str>,
    ) -> DentalResult<TreatmentPlan> {
        let mut patient = self
            .docs
            .get_patient(patient_id)?
            .ok_or_else(|| DentalError::not_found("Patient", patient_id))?;

        let now = chrono::Utc::now().to_rfc3339();
        let plan =
            TreatmentPlan::build(patient_id, clinic_id, doctor_id, definition, visit_id, &now)?;
        self.docs.insert_plan(&plan)?;

        let mut ctx = WorkContext::new(doctor_id).with_plan(plan.plan_id.clone());
        ctx.visit_id = visit_id.map(str::to_string);
        patient
            .dental_chart
            .apply_work(&plan.planned_chart_work(), &ctx, &now)?;
        patient.link_plan(&plan.plan_id);
        self.docs.save_patient(&mut patient)?;

        info!(
            plan_id = %plan.plan_id,
            patient_id,
            stages = plan.stages.len(),
            "Treatment plan created"
        );
        Ok(plan)
    }

    pub fn update_stage_completion(
        &self,
        plan_id: &str,
        stage_number: u32,
        visit_id: Option<&str>,
        doctor_id: &str,
    ) -> DentalResult<PlanUpdate> {
        let mut plan = self.get(plan_id)?;
        let now = chrono::Utc::now().to_rfc3339();
        let completed = plan.complete_stage(stage_number, visit_id, doctor_id, &now)?;
        self.save(&plan)?;

        info!(plan_id, stage_number, status = plan.status.as_str(), "Stage completed");
        Ok(PlanUpdate { plan, completed })
    }

    pub fn update_specific_procedures(
        &self,
        plan_id: &str,
        refs: &[ProcedureRef],
        visit_id: Option<&str>,
        doctor_id: &str,
    ) -> DentalResult<PlanUpdate> {
        if refs.is_empty() {
            return Err(DentalError::validation("completedProcedures", "must not be empty"));
        }
        let mut plan = self.get(plan_id)?;
        let now = chrono::Utc::now().to_rfc3339();
        let completed = plan.complete_procedures(refs, visit_id, doctor_id, &now)?;
        self.save(&plan)?;

        info!(
            plan_id,
            completed = completed.len(),
            status = plan.status.as_str(),
            "Plan procedures completed"
        );
        Ok(PlanUpdate { plan, completed })
    }

    /// Write newly completed plan procedures into the patient's chart.
    pub fn mirror_into_chart(
        &self,
        update: &PlanUpdate,
        doctor_id: &str,
        visit_id: Option<&str>,
    ) -> DentalResult<()> {
        self.mirror(update, doctor_id, visit_id, ConflictPolicy::Enforce)
    }

    fn mirror(
        &self,
        update: &PlanUpdate,
        doctor_id: &str,
        visit_id: Option<&str>,
        conflicts: ConflictPolicy,
    ) -> DentalResult<()> {
        if update.completed.is_empty() {
            return Ok(());
        }
        let mut ctx = WorkContext::new(doctor_id)
            .with_plan(update.plan.plan_id.clone())
            .with_conflicts(conflicts);
        ctx.visit_id = visit_id.map(str::to_string);

        ChartStore::new(self.docs).apply_work(
            &update.plan.patient_id,
            &completed_chart_work(&update.completed),
            &ctx,
        )?;
        Ok(())
    }

    pub fn start_stage(&self, plan_id: &str, stage_number: u32) -> DentalResult<TreatmentPlan> {
        let mut plan = self.get(plan_id)?;
        plan.start_stage(stage_number, &chrono::Utc::now().to_rfc3339())?;
        self.save(&plan)?;
        info!(plan_id, stage_number, "Stage started");
        Ok(plan)
    }

    /// Append a stage and chart its work as planned under this plan.
    pub fn add_stage(
        &self,
        plan_id: &str,
        new_stage: NewStage,
        doctor_id: &str,
    ) -> DentalResult<TreatmentPlan> {
        let mut plan = self.get(plan_id)?;
        let now = chrono::Utc::now().to_rfc3339();
        let stage_number = plan.add_stage(new_stage, &now)?;
        self.save(&plan)?;

        let ctx = WorkContext::new(doctor_id).with_plan(plan.plan_id.clone());
        ChartStore::new(self.docs).apply_work(
            &plan.patient_id,
            &plan.stage_chart_work(stage_number),
            &ctx,
        )?;

        info!(plan_id, stage_number, "Stage added");
        Ok(plan)
    }

    pub fn remove_stage(&self, plan_id: &str, stage_number: u32) -> DentalResult<TreatmentPlan> {
        let mut plan = self.get(plan_id)?;
        plan.remove_stage(stage_number, &chrono::Utc::now().to_rfc3339())?;
        self.save(&plan)?;
        self.withdraw_from_chart(&plan, |tooth, entry| {
            !plan.contains_procedure(tooth, &entry.name, entry.surface)
        })?;
        info!(plan_id, stage_number, "Stage removed");
        Ok(plan)
    }

    pub fn remove_procedure(
        &self,
        plan_id: &str,
        tooth_number: ToothNumber,
        procedure_name: &str,
        surface: Surface,
    ) -> DentalResult<TreatmentPlan> {
        let mut plan = self.get(plan_id)?;
        plan.remove_procedure(
            tooth_number,
            procedure_name,
            surface,
            &chrono::Utc::now().to_rfc3339(),
        )?;
        self.save(&plan)?;
        self.withdraw_from_chart(&plan, |tooth, entry| {
            tooth == tooth_number && !plan.contains_procedure(tooth, &entry.name, entry.surface)
        })?;
        Ok(plan)
    }

    /// Force-complete the plan and close its chart entries.
    ///
    /// The chart write records what was done rather than judging it, so it
    /// does not stop on surface conflicts.
    pub fn finish(&self, plan_id: &str, doctor_id: &str) -> DentalResult<PlanUpdate> {
        let mut plan = self.get(plan_id)?;
        let completed = plan.finish(doctor_id, &chrono::Utc::now().to_rfc3339())?;
        self.save(&plan)?;

        let update = PlanUpdate { plan, completed };
        self.mirror(&update, doctor_id, None, ConflictPolicy::Skip)?;
        info!(plan_id, doctor_id, completed = update.completed.len(), "Treatment plan finished");
        Ok(update)
    }

    /// Cancel the plan; its open chart entries are withdrawn.
    pub fn cancel(
        &self,
        plan_id: &str,
        reason: Option<String>,
        doctor_id: &str,
    ) -> DentalResult<TreatmentPlan> {
        let mut plan = self.get(plan_id)?;
        plan.cancel(reason, doctor_id, &chrono::Utc::now().to_rfc3339())?;
        self.save(&plan)?;
        self.withdraw_from_chart(&plan, |_, _| true)?;
        info!(plan_id, doctor_id, "Treatment plan cancelled");
        Ok(plan)
    }

    fn withdraw_from_chart<F>(&self, plan: &TreatmentPlan, withdrawn: F) -> DentalResult<usize>
    where
        F: FnMut(ToothNumber, &ProcedureEntry) -> bool,
    {
        let mut patient = self
            .docs
            .get_patient(&plan.patient_id)?
            .ok_or_else(|| DentalError::not_found("Patient", plan.patient_id.clone()))?;
        let removed = patient.dental_chart.withdraw_planned(&plan.plan_id, withdrawn);
        if removed > 0 {
            self.docs.save_patient(&mut patient)?;
            debug!(plan_id = %plan.plan_id, removed, "Withdrew planned chart entries");
        }
        Ok(removed)
    }

    fn save(&self, plan: &TreatmentPlan) -> DentalResult<()> {
        if !self.docs.update_plan(plan)? {
            return Err(DentalError::not_found("Treatment plan", plan.plan_id.clone()));
        }
        Ok(())
    }
}

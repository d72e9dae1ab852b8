//! Chart persistence: load the patient, mutate the chart, write it back.

use tracing::{debug, info};

use super::apply::{ConflictPolicy, WorkContext};
use super::conflict::{find_conflict, SurfaceConflict};
use crate::db::Documents;
use crate::error::{DentalError, DentalResult};
use crate::models::{
    DentalChart, EntryKind, Patient, ProcedureInput, ProcedureStatus, Surface, ToothNumber,
    ToothRecord, ToothWork,
};

/// Dental chart reads and writes for one patient at a time.
///
/// Writes load the whole patient document and save it back in one statement,
/// so they must run on the [`Documents`] of a unit of work when they are part
/// of a larger operation.
pub struct ChartStore<'c> {
    docs: Documents<'c>,
}

impl<'c> ChartStore<'c> {
    pub fn new(docs: Documents<'c>) -> Self {
        Self { docs }
    }

    fn load(&self, patient_id: &str) -> DentalResult<Patient> {
        let mut patient = self
            .docs
            .get_patient(patient_id)?
            .ok_or_else(|| DentalError::not_found("Patient", patient_id))?;

        let dropped = patient.dental_chart.dedup_legacy();
        if dropped > 0 {
            debug!(patient_id, dropped, "Collapsed duplicate chart entries");
        }
        Ok(patient)
    }

    /// The full chart, teeth sorted by number.
    pub fn chart(&self, patient_id: &str) -> DentalResult<DentalChart> {
        Ok(self.load(patient_id)?.dental_chart)
    }

    /// One tooth; a tooth nobody has touched yet comes back empty.
    pub fn tooth(&self, patient_id: &str, tooth_number: ToothNumber) -> DentalResult<ToothRecord> {
        let chart = self.chart(patient_id)?;
        Ok(chart
            .tooth(tooth_number)
            .cloned()
            .unwrap_or_else(|| ToothRecord::new(tooth_number)))
    }

    /// Dry-run conflict check; nothing is written.
    pub fn check_conflict(
        &self,
        patient_id: &str,
        tooth_number: ToothNumber,
        surface: Surface,
    ) -> DentalResult<Option<SurfaceConflict>> {
        let chart = self.chart(patient_id)?;
        Ok(find_conflict(&chart, tooth_number, surface))
    }

    /// Apply tooth work and persist the patient document.
    pub fn apply_work(
        &self,
        patient_id: &str,
        works: &[ToothWork],
        ctx: &WorkContext,
    ) -> DentalResult<DentalChart> {
        let mut patient = self.load(patient_id)?;
        if works.iter().all(ToothWork::is_empty) {
            return Ok(patient.dental_chart);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let summary = patient.dental_chart.apply_work(works, ctx, &now)?;
        self.docs.save_patient(&mut patient)?;

        info!(
            patient_id,
            teeth = works.len(),
            appended = summary.appended,
            transitioned = summary.transitioned,
            "Dental chart updated"
        );
        Ok(patient.dental_chart)
    }

    /// Record a single procedure outside a consultation.
    ///
    /// New planned or completed treatments are always checked against the
    /// chart, whatever policy a consultation would use.
    pub fn add_procedure(
        &self,
        patient_id: &str,
        tooth_number: ToothNumber,
        procedure: ProcedureInput,
        doctor_id: &str,
        visit_id: Option<&str>,
    ) -> DentalResult<ToothRecord> {
        let chart = self.chart(patient_id)?;

        let is_new = chart.tooth(tooth_number).map_or(true, |record| {
            !record.procedures.iter().any(|e| {
                e.kind == EntryKind::Treatment
                    && e.surface == procedure.surface
                    && e.treatment_plan_id.is_none()
                    && e.name == procedure.name.trim()
            })
        });
        if is_new && procedure.status != ProcedureStatus::InProgress {
            if let Some(conflict) = find_conflict(&chart, tooth_number, procedure.surface) {
                return Err(conflict.into());
            }
        }

        let mut ctx = WorkContext::new(doctor_id).with_conflicts(ConflictPolicy::Enforce);
        ctx.visit_id = visit_id.map(str::to_string);

        let mut work = ToothWork::new(tooth_number);
        work.procedures.push(procedure);

        let chart = self.apply_work(patient_id, &[work], &ctx)?;
        Ok(chart
            .tooth(tooth_number)
            .cloned()
            .unwrap_or_else(|| ToothRecord::new(tooth_number)))
    }
}

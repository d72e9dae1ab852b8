//! Consultation payload and its normalisation.

use serde::{Deserialize, Serialize};

use crate::error::{DentalError, DentalResult};
use crate::models::{
    Appointment, DentalWork, NewPlan, Prescription, ProcedureRef, ProcedureStatus, Recall,
    ToothWork, TreatmentPlan, Visit,
};

/// Progress recorded against an existing plan during the visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanProgress {
    pub treatment_plan_id: String,
    /// Close this whole stage
    pub completed_stage: Option<u32>,
    #[serde(default)]
    pub completed_procedures: Vec<ProcedureRef>,
}

/// Everything a doctor submits at the end of a consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
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
    /// Work done in the chair today
    #[serde(default)]
    pub performed_teeth: Vec<ToothWork>,
    /// Work to schedule, charted as planned
    #[serde(default)]
    pub planned_teeth: Vec<ToothWork>,
    pub plan_progress: Option<PlanProgress>,
    pub treatment_plan: Option<NewPlan>,
    pub recall: Option<Recall>,
}

impl ConsultationRequest {
    /// Trim text, drop blanks and duplicates, and reject contradictions.
    pub fn normalize(&mut self) -> DentalResult<()> {
        if self.plan_progress.is_some() && self.treatment_plan.is_some() {
            return Err(DentalError::validation(
                "treatmentPlan",
                "send either planProgress or a new treatmentPlan, not both",
            ));
        }

        clean_list(&mut self.chief_complaints);
        clean_list(&mut self.examination_findings);
        clean_list(&mut self.dental_history);
        clean_list(&mut self.diagnosis);
        self.notes = self
            .notes
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        self.prescriptions.retain(|p| !p.medicine.trim().is_empty());
        for prescription in &mut self.prescriptions {
            prescription.medicine = prescription.medicine.trim().to_string();
        }

        self.performed_teeth.retain(|w| !w.is_empty());
        self.planned_teeth.retain(|w| !w.is_empty());
        for work in &mut self.planned_teeth {
            for procedure in &mut work.procedures {
                procedure.status = ProcedureStatus::Planned;
            }
        }

        if let Some(progress) = &mut self.plan_progress {
            progress.treatment_plan_id = progress.treatment_plan_id.trim().to_string();
            if progress.treatment_plan_id.is_empty() {
                return Err(DentalError::validation(
                    "planProgress.treatmentPlanId",
                    "must not be empty",
                ));
            }
            if progress.completed_stage.is_none() && progress.completed_procedures.is_empty() {
                return Err(DentalError::validation(
                    "planProgress",
                    "name a completed stage or completed procedures",
                ));
            }
        }

        if let Some(recall) = &self.recall {
            if recall.date.trim().is_empty() {
                return Err(DentalError::validation("recall.date", "must not be empty"));
            }
        }
        Ok(())
    }

    /// Copy the clinical fields onto a visit.
    pub(crate) fn fill_visit(&self, visit: &mut Visit) {
        visit.chief_complaints = self.chief_complaints.clone();
        visit.examination_findings = self.examination_findings.clone();
        visit.dental_history = self.dental_history.clone();
        visit.diagnosis = self.diagnosis.clone();
        visit.prescriptions = self.prescriptions.clone();
        visit.notes = self.notes.clone();
        visit.dental_work = dental_work(&self.performed_teeth);
        visit.planned_work = dental_work(&self.planned_teeth);
        visit.recall = self.recall.clone();
    }
}

fn clean_list(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    let cleaned: Vec<String> = items
        .drain(..)
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.to_lowercase()))
        .collect();
    *items = cleaned;
}

fn dental_work(teeth: &[ToothWork]) -> Vec<DentalWork> {
    teeth
        .iter()
        .flat_map(|work| {
            work.procedures.iter().map(move |p| DentalWork {
                tooth_number: work.tooth_number,
                surface: p.surface,
                procedure: p.name.trim().to_string(),
                status: p.status,
                cost: p.cost,
            })
        })
        .collect()
}

/// What a committed consultation produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationOutcome {
    pub visit: Visit,
    pub treatment_plan: Option<TreatmentPlan>,
    pub plan_updated: bool,
    pub recall_appointment: Option<Appointment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProcedureInput, Surface, ToothNumber};

    #[test]
    fn test_normalize_cleans_lists() {
        let mut request = ConsultationRequest {
            chief_complaints: vec![" Pain ".into(), "pain".into(), "".into(), "Swelling".into()],
            notes: Some("   ".into()),
            ..Default::default()
        };
        request.normalize().unwrap();

        assert_eq!(request.chief_complaints, vec!["Pain", "Swelling"]);
        assert_eq!(request.notes, None);
    }

    #[test]
    fn test_normalize_rejects_both_plan_branches() {
        let mut request = ConsultationRequest {
            plan_progress: Some(PlanProgress {
                treatment_plan_id: "p".into(),
                completed_stage: Some(1),
                completed_procedures: vec![],
            }),
            treatment_plan: Some(NewPlan {
                plan_name: "x".into(),
                description: None,
                teeth: vec![],
                stages: vec![],
            }),
            ..Default::default()
        };
        assert!(matches!(request.normalize(), Err(DentalError::Validation { .. })));
    }

    #[test]
    fn test_planned_teeth_forced_planned() {
        let mut work = ToothWork::new(ToothNumber::new(2).unwrap());
        work.procedures.push(ProcedureInput::new(
            "Sealant",
            Surface::Occlusal,
            ProcedureStatus::Completed,
        ));
        let mut request = ConsultationRequest {
            planned_teeth: vec![work, ToothWork::new(ToothNumber::new(3).unwrap())],
            ..Default::default()
        };
        request.normalize().unwrap();

        assert_eq!(request.planned_teeth.len(), 1);
        assert_eq!(request.planned_teeth[0].procedures[0].status, ProcedureStatus::Planned);
    }

    #[test]
    fn test_empty_plan_progress_rejected() {
        let mut request = ConsultationRequest {
            plan_progress: Some(PlanProgress {
                treatment_plan_id: "p".into(),
                completed_stage: None,
                completed_procedures: vec![],
            }),
            ..Default::default()
        };
        assert!(request.normalize().is_err());
    }
}

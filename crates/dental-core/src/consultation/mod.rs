//! Consultation transaction coordinator.
//!
//! One consultation writes four documents: the new visit, the patient's
//! chart and history, the treatment plan, and the appointment. All of it
//! happens inside one [`UnitOfWork`](crate::db::UnitOfWork); any error drops
//! the transaction and nothing becomes visible.
//!
//! ```text
//! appointment ─► patient ─► visit ─► chart (performed) ─► plan ─► recall
//!                                                                   │
//!                              commit ◄─ visit history ◄─ appointment done
//! ```

mod request;

pub use request::{ConsultationOutcome, ConsultationRequest, PlanProgress};

use tracing::{error, info, warn};

use crate::chart::{ChartStore, WorkContext};
use crate::db::{Database, Documents};
use crate::error::{DentalError, DentalResult};
use crate::external::{DirectoryLookup, FeeLookup, Noop, Notification, NotificationSink};
use crate::models::{Visit, VisitStatus};
use crate::plan::TreatmentPlanService;

/// Runs consultations against injected upstream capabilities.
pub struct ConsultationCoordinator<'a> {
    fees: &'a dyn FeeLookup,
    directory: &'a dyn DirectoryLookup,
    notifications: &'a dyn NotificationSink,
}

impl<'a> ConsultationCoordinator<'a> {
    pub fn new(
        fees: &'a dyn FeeLookup,
        directory: &'a dyn DirectoryLookup,
        notifications: &'a dyn NotificationSink,
    ) -> Self {
        Self {
            fees,
            directory,
            notifications,
        }
    }

    /// Coordinator with every upstream switched off.
    pub fn offline() -> ConsultationCoordinator<'static> {
        ConsultationCoordinator::new(&Noop, &Noop, &Noop)
    }

    /// Record a consultation for an appointment, all or nothing.
    pub fn consult(
        &self,
        db: &mut Database,
        appointment_id: &str,
        doctor_id: &str,
        mut request: ConsultationRequest,
    ) -> DentalResult<ConsultationOutcome> {
        request.normalize()?;

        let uow = db.unit_of_work()?;
        let recorded = self.record(uow.documents(), appointment_id, doctor_id, &request);
        let (outcome, notification) = match recorded {
            Ok(result) => result,
            Err(e) => {
                if let Err(rollback) = uow.rollback() {
                    error!(appointment_id, error = %rollback, "Consultation rollback failed");
                }
                warn!(appointment_id, doctor_id, error = %e, "Consultation aborted");
                return Err(e);
            }
        };
        uow.commit()?;

        info!(
            appointment_id,
            visit_id = %outcome.visit.visit_id,
            patient_id = %outcome.visit.patient_id,
            plan_id = outcome.visit.treatment_plan_id.as_deref().unwrap_or("-"),
            plan_updated = outcome.plan_updated,
            "Consultation recorded"
        );

        if let Some(notification) = notification {
            if let Err(e) = self.notifications.notify(&notification) {
                warn!(visit_id = %outcome.visit.visit_id, error = %e, "Recall notification failed");
            }
        }
        Ok(outcome)
    }

    fn record(
        &self,
        docs: Documents<'_>,
        appointment_id: &str,
        doctor_id: &str,
        request: &ConsultationRequest,
    ) -> DentalResult<(ConsultationOutcome, Option<Notification>)> {
        // 1. appointment
        let appointment = docs
            .get_appointment(appointment_id)?
            .ok_or_else(|| DentalError::not_found("Appointment", appointment_id))?;
        if !appointment.status.is_consultable() {
            return Err(DentalError::invalid_state(format!(
                "appointment {} is {}",
                appointment_id,
                appointment.status.as_str()
            )));
        }
        if appointment.doctor_id != doctor_id {
            return Err(DentalError::Forbidden(format!(
                "appointment {} is assigned to another doctor",
                appointment_id
            )));
        }

        // 2. patient and best-effort lookups
        let patient = docs
            .get_patient(&appointment.patient_id)?
            .ok_or_else(|| DentalError::not_found("Patient", appointment.patient_id.clone()))?;

        let fee = self
            .fees
            .consultation_fee(&appointment.clinic_id, doctor_id)
            .unwrap_or_else(|e| {
                warn!(
                    clinic_id = %appointment.clinic_id,
                    doctor_id,
                    error = %e,
                    "Fee lookup failed, charging 0"
                );
                0.0
            });
        let profile = self.directory.doctor(doctor_id).unwrap_or_else(|e| {
            warn!(doctor_id, error = %e, "Doctor lookup failed");
            None
        });

        // 3-4. visit
        let mut visit = Visit::new(
            patient.patient_id.clone(),
            appointment.appointment_id.clone(),
            doctor_id.to_string(),
            appointment.clinic_id.clone(),
        );
        request.fill_visit(&mut visit);
        visit.consultation_fee = fee;
        visit.department = appointment
            .department
            .clone()
            .or_else(|| profile.as_ref().and_then(|p| p.department.clone()));
        visit.doctor_name = profile.map(|p| p.name);
        visit.set_snapshot(patient.dental_chart.teeth().to_vec())?;
        docs.insert_visit(&visit)?;

        // 5. performed work goes on the chart before any plan logic; only
        // procedures the plan carries are tagged with it
        let plans = TreatmentPlanService::new(docs);
        let progress_plan = match &request.plan_progress {
            Some(progress) => {
                let plan = plans.get(&progress.treatment_plan_id)?;
                if plan.patient_id != patient.patient_id {
                    return Err(DentalError::validation(
                        "planProgress.treatmentPlanId",
                        "plan belongs to another patient",
                    ));
                }
                Some(plan)
            }
            None => None,
        };

        let chart = ChartStore::new(docs);
        let mut ctx = WorkContext::new(doctor_id).with_visit(visit.visit_id.clone());
        if let Some(plan) = &progress_plan {
            ctx = ctx.with_plan_slots(plan.plan_id.clone(), plan.procedure_slots());
        }
        if !request.performed_teeth.is_empty() {
            chart.apply_work(&patient.patient_id, &request.performed_teeth, &ctx)?;
        }
        if !request.planned_teeth.is_empty() {
            chart.apply_work(&patient.patient_id, &request.planned_teeth, &ctx)?;
        }

        // 6-7. plan branch
        let mut plan_updated = false;
        let mut treatment_plan = None;

        if let (Some(progress), Some(plan)) = (&request.plan_progress, progress_plan) {
            let mut latest = plan;
            if let Some(stage_number) = progress.completed_stage {
                let update = plans.update_stage_completion(
                    &latest.plan_id,
                    stage_number,
                    Some(&visit.visit_id),
                    doctor_id,
                )?;
                plans.mirror_into_chart(&update, doctor_id, Some(&visit.visit_id))?;
                latest = update.plan;
            }
            if !progress.completed_procedures.is_empty() {
                let update = plans.update_specific_procedures(
                    &latest.plan_id,
                    &progress.completed_procedures,
                    Some(&visit.visit_id),
                    doctor_id,
                )?;
                plans.mirror_into_chart(&update, doctor_id, Some(&visit.visit_id))?;
                latest = update.plan;
            }
            plan_updated = true;
            treatment_plan = Some(latest);
        } else if let Some(definition) = &request.treatment_plan {
            let plan = plans.create_plan(
                &patient.patient_id,
                &appointment.clinic_id,
                doctor_id,
                definition.clone(),
                Some(&visit.visit_id),
            )?;
            treatment_plan = Some(plan);
        }

        if let Some(plan) = &treatment_plan {
            visit.treatment_plan_id = Some(plan.plan_id.clone());
        }

        // 8. recall
        let recall_appointment = match &request.recall {
            Some(recall) => {
                let mut follow_up = appointment.recall_of(
                    &visit.visit_id,
                    recall.date.trim().to_string(),
                    recall.time.clone(),
                );
                follow_up.notes = recall.notes.clone();
                docs.insert_appointment(&follow_up)?;
                Some(follow_up)
            }
            None => None,
        };

        // 9-10. appointment, history, visit finalisation
        docs.complete_appointment(&appointment.appointment_id, &visit.visit_id)?;

        let mut patient = docs
            .get_patient(&patient.patient_id)?
            .ok_or_else(|| DentalError::not_found("Patient", patient.patient_id.clone()))?;
        patient.link_visit(&visit.visit_id);
        docs.save_patient(&mut patient)?;

        visit.status = VisitStatus::Completed;
        docs.finalize_visit(&visit)?;

        let notification = recall_appointment.as_ref().map(|follow_up| Notification {
            kind: "recall".to_string(),
            patient_id: follow_up.patient_id.clone(),
            clinic_id: follow_up.clinic_id.clone(),
            doctor_id: follow_up.doctor_id.clone(),
            appointment_id: Some(follow_up.appointment_id.clone()),
            date: Some(follow_up.date.clone()),
            time: follow_up.time.clone(),
            message: format!("Recall visit booked for {}", follow_up.date),
        });

        Ok((
            ConsultationOutcome {
                visit,
                treatment_plan,
                plan_updated,
                recall_appointment,
            },
            notification,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{DoctorProfile, UpstreamError, UpstreamResult};
    use crate::models::{
        Appointment, AppointmentStatus, Patient, ProcedureInput, ProcedureStatus, Recall, Surface,
        ToothNumber, ToothWork,
    };
    use std::sync::Mutex;

    struct FailingUpstream;

    impl FeeLookup for FailingUpstream {
        fn consultation_fee(&self, _: &str, _: &str) -> UpstreamResult<f64> {
            Err(UpstreamError::Unavailable("timeout".into()))
        }
    }

    impl DirectoryLookup for FailingUpstream {
        fn doctor(&self, _: &str) -> UpstreamResult<Option<DoctorProfile>> {
            Err(UpstreamError::Status { status: 503 })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, notification: &Notification) -> UpstreamResult<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct FixedFee(f64);

    impl FeeLookup for FixedFee {
        fn consultation_fee(&self, _: &str, _: &str) -> UpstreamResult<f64> {
            Ok(self.0)
        }
    }

    fn setup_db() -> (Database, Appointment) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("pat-1".into(), "clinic-1".into(), "Ada".into());
        db.documents().insert_patient(&patient).unwrap();
        let appointment = Appointment::new(
            "pat-1".into(),
            "doc-1".into(),
            "clinic-1".into(),
            "2026-03-01".into(),
        );
        db.documents().insert_appointment(&appointment).unwrap();
        (db, appointment)
    }

    fn filling_request() -> ConsultationRequest {
        let mut work = ToothWork::new(ToothNumber::new(14).unwrap());
        let mut filling =
            ProcedureInput::new("Filling", Surface::Occlusal, ProcedureStatus::Completed);
        filling.cost = Some(500.0);
        work.procedures.push(filling);
        ConsultationRequest {
            chief_complaints: vec!["Sensitivity".into()],
            performed_teeth: vec![work],
            ..Default::default()
        }
    }

    #[test]
    fn test_upstream_failures_do_not_block() {
        let (mut db, appointment) = setup_db();
        let coordinator = ConsultationCoordinator::new(&FailingUpstream, &FailingUpstream, &Noop);

        let outcome = coordinator
            .consult(&mut db, &appointment.appointment_id, "doc-1", filling_request())
            .unwrap();
        assert_eq!(outcome.visit.consultation_fee, 0.0);
        assert_eq!(outcome.visit.doctor_name, None);
        assert_eq!(outcome.visit.status, VisitStatus::Completed);
    }

    #[test]
    fn test_fee_recorded_and_snapshot_is_pre_visit() {
        let (mut db, appointment) = setup_db();
        let coordinator = ConsultationCoordinator::new(&FixedFee(75.0), &Noop, &Noop);

        let outcome = coordinator
            .consult(&mut db, &appointment.appointment_id, "doc-1", filling_request())
            .unwrap();
        assert_eq!(outcome.visit.consultation_fee, 75.0);
        assert!(outcome.visit.dental_chart_snapshot.is_empty());
        assert!(outcome.visit.snapshot_intact());
        assert_eq!(outcome.visit.dental_work.len(), 1);
    }

    #[test]
    fn test_wrong_doctor_forbidden() {
        let (mut db, appointment) = setup_db();
        let err = ConsultationCoordinator::offline()
            .consult(&mut db, &appointment.appointment_id, "doc-2", filling_request())
            .unwrap_err();
        assert!(matches!(err, DentalError::Forbidden(_)));
        assert_eq!(db.documents().count_visits().unwrap(), 0);
    }

    #[test]
    fn test_completed_appointment_rejected() {
        let (mut db, appointment) = setup_db();
        let coordinator = ConsultationCoordinator::offline();
        coordinator
            .consult(&mut db, &appointment.appointment_id, "doc-1", ConsultationRequest::default())
            .unwrap();

        let err = coordinator
            .consult(&mut db, &appointment.appointment_id, "doc-1", ConsultationRequest::default())
            .unwrap_err();
        assert!(matches!(err, DentalError::InvalidState(_)));
    }

    #[test]
    fn test_unknown_appointment() {
        let (mut db, _) = setup_db();
        let err = ConsultationCoordinator::offline()
            .consult(&mut db, "nope", "doc-1", ConsultationRequest::default())
            .unwrap_err();
        assert!(matches!(err, DentalError::NotFound { entity: "Appointment", .. }));
    }

    #[test]
    fn test_recall_booked_and_announced() {
        let (mut db, appointment) = setup_db();
        let sink = RecordingSink::default();
        let coordinator = ConsultationCoordinator::new(&Noop, &Noop, &sink);

        let request = ConsultationRequest {
            recall: Some(Recall {
                date: "2026-09-01".into(),
                time: Some("10:30".into()),
                notes: None,
            }),
            ..Default::default()
        };
        let outcome = coordinator
            .consult(&mut db, &appointment.appointment_id, "doc-1", request)
            .unwrap();

        let recall = outcome.recall_appointment.unwrap();
        assert_eq!(recall.status, AppointmentStatus::Recall);
        assert_eq!(recall.previous_visit_id.as_deref(), Some(outcome.visit.visit_id.as_str()));
        assert!(db.documents().get_appointment(&recall.appointment_id).unwrap().is_some());

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, "recall");
    }
}

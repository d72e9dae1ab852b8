//! Appointment database operations.

use rusqlite::{params, OptionalExtension};

use super::{DbError, DbResult, Documents};
use crate::models::{Appointment, AppointmentStatus};

impl Documents<'_> {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                appointment_id, patient_id, doctor_id, clinic_id, department,
                date, time, status, visit_id, previous_visit_id, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                appointment.appointment_id,
                appointment.patient_id,
                appointment.doctor_id,
                appointment.clinic_id,
                appointment.department,
                appointment.date,
                appointment.time,
                appointment.status.as_str(),
                appointment.visit_id,
                appointment.previous_visit_id,
                appointment.notes,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Mark an appointment completed and link the visit it produced.
    pub fn complete_appointment(&self, appointment_id: &str, visit_id: &str) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                status = 'completed',
                visit_id = ?2,
                updated_at = ?3
            WHERE appointment_id = ?1
            "#,
            params![appointment_id, visit_id, chrono::Utc::now().to_rfc3339()],
        )?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("appointment {}", appointment_id)));
        }
        Ok(())
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, appointment_id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                r#"
                SELECT appointment_id, patient_id, doctor_id, clinic_id, department,
                       date, time, status, visit_id, previous_visit_id, notes,
                       created_at, updated_at
                FROM appointments
                WHERE appointment_id = ?
                "#,
                [appointment_id],
                |row| {
                    Ok(AppointmentRow {
                        appointment_id: row.get(0)?,
                        patient_id: row.get(1)?,
                        doctor_id: row.get(2)?,
                        clinic_id: row.get(3)?,
                        department: row.get(4)?,
                        date: row.get(5)?,
                        time: row.get(6)?,
                        status: row.get(7)?,
                        visit_id: row.get(8)?,
                        previous_visit_id: row.get(9)?,
                        notes: row.get(10)?,
                        created_at: row.get(11)?,
                        updated_at: row.get(12)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    appointment_id: String,
    patient_id: String,
    doctor_id: String,
    clinic_id: String,
    department: Option<String>,
    date: String,
    time: Option<String>,
    status: String,
    visit_id: Option<String>,
    previous_visit_id: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status: AppointmentStatus = row.status.parse().map_err(DbError::Constraint)?;

        Ok(Appointment {
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            clinic_id: row.clinic_id,
            department: row.department,
            date: row.date,
            time: row.time,
            status,
            visit_id: row.visit_id,
            previous_visit_id: row.previous_visit_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

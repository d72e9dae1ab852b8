//! Visit document operations.

use rusqlite::{params, OptionalExtension};

use super::{DbError, DbResult, Documents};
use crate::models::{Visit, VisitStatus};

impl Documents<'_> {
    /// Insert a new visit.
    pub fn insert_visit(&self, visit: &Visit) -> DbResult<()> {
        let document = serde_json::to_string(visit)?;

        self.conn.execute(
            r#"
            INSERT INTO visits (
                visit_id, patient_id, appointment_id, doctor_id,
                treatment_plan_id, status, document, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                visit.visit_id,
                visit.patient_id,
                visit.appointment_id,
                visit.doctor_id,
                visit.treatment_plan_id,
                status_to_string(visit.status),
                document,
                visit.created_at,
            ],
        )?;
        Ok(())
    }

    /// Write the plan back-link and the finalised status.
    ///
    /// These are the only two visit fields that change after insert; the
    /// schema rejects re-pointing an existing back-link.
    pub fn finalize_visit(&self, visit: &Visit) -> DbResult<()> {
        let document = serde_json::to_string(visit)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                treatment_plan_id = ?2,
                status = ?3,
                document = ?4
            WHERE visit_id = ?1
            "#,
            params![
                visit.visit_id,
                visit.treatment_plan_id,
                status_to_string(visit.status),
                document,
            ],
        )?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("visit {}", visit.visit_id)));
        }
        Ok(())
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, visit_id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                "SELECT document FROM visits WHERE visit_id = ?",
                [visit_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|doc| serde_json::from_str(&doc).map_err(DbError::from))
            .transpose()
    }

    /// List visits for a patient, oldest first.
    pub fn list_visits_for_patient(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT document FROM visits
            WHERE patient_id = ?
            ORDER BY created_at ASC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| row.get::<_, String>(0))?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(serde_json::from_str(&row?)?);
        }
        Ok(visits)
    }

    pub fn count_visits(&self) -> DbResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM visits", [], |row| row.get(0))?)
    }
}

fn status_to_string(status: VisitStatus) -> &'static str {
    match status {
        VisitStatus::Open => "open",
        VisitStatus::Completed => "completed",
    }
}

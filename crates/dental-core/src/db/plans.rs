//! Treatment plan document operations.

use rusqlite::{params, OptionalExtension};

use super::{DbError, DbResult, Documents};
use crate::models::TreatmentPlan;

impl Documents<'_> {
    /// Insert a new treatment plan.
    pub fn insert_plan(&self, plan: &TreatmentPlan) -> DbResult<()> {
        let document = serde_json::to_string(plan)?;

        self.conn.execute(
            r#"
            INSERT INTO treatment_plans (
                plan_id, patient_id, clinic_id, status, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                plan.plan_id,
                plan.patient_id,
                plan.clinic_id,
                plan.status.as_str(),
                document,
                plan.created_at,
                plan.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Replace a stored plan document.
    pub fn update_plan(&self, plan: &TreatmentPlan) -> DbResult<bool> {
        let document = serde_json::to_string(plan)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE treatment_plans SET
                status = ?2,
                document = ?3,
                updated_at = ?4
            WHERE plan_id = ?1
            "#,
            params![plan.plan_id, plan.status.as_str(), document, plan.updated_at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a plan by ID.
    pub fn get_plan(&self, plan_id: &str) -> DbResult<Option<TreatmentPlan>> {
        self.conn
            .query_row(
                "SELECT document FROM treatment_plans WHERE plan_id = ?",
                [plan_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|doc| serde_json::from_str(&doc).map_err(DbError::from))
            .transpose()
    }

    /// List a patient's plans, newest first.
    pub fn list_plans_for_patient(&self, patient_id: &str) -> DbResult<Vec<TreatmentPlan>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT document FROM treatment_plans
            WHERE patient_id = ?
            ORDER BY created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| row.get::<_, String>(0))?;

        let mut plans = Vec::new();
        for row in rows {
            plans.push(serde_json::from_str(&row?)?);
        }
        Ok(plans)
    }
}

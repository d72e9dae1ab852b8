//! Patient document operations.

use rusqlite::{params, OptionalExtension};

use super::{DbError, DbResult, Documents};
use crate::models::{DentalChart, Patient};

impl Documents<'_> {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let chart_json = serde_json::to_string(&patient.dental_chart)?;
        let plans_json = serde_json::to_string(&patient.treatment_plan_ids)?;
        let visits_json = serde_json::to_string(&patient.visit_ids)?;

        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, clinic_id, name, phone, email, dental_chart,
                treatment_plan_ids, visit_ids, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                patient.patient_id,
                patient.clinic_id,
                patient.name,
                patient.phone,
                patient.email,
                chart_json,
                plans_json,
                visits_json,
                patient.version,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Write the whole patient document back.
    ///
    /// The stored version must still equal `patient.version`; on success the
    /// in-memory version is bumped to match the row.
    pub fn save_patient(&self, patient: &mut Patient) -> DbResult<()> {
        let chart_json = serde_json::to_string(&patient.dental_chart)?;
        let plans_json = serde_json::to_string(&patient.treatment_plan_ids)?;
        let visits_json = serde_json::to_string(&patient.visit_ids)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?3,
                phone = ?4,
                email = ?5,
                dental_chart = ?6,
                treatment_plan_ids = ?7,
                visit_ids = ?8,
                version = version + 1,
                updated_at = ?9
            WHERE patient_id = ?1 AND version = ?2
            "#,
            params![
                patient.patient_id,
                patient.version,
                patient.name,
                patient.phone,
                patient.email,
                chart_json,
                plans_json,
                visits_json,
                updated_at,
            ],
        )?;

        if rows_affected == 0 {
            return Err(if self.patient_exists(&patient.patient_id)? {
                DbError::WriteConflict {
                    collection: "patients",
                    id: patient.patient_id.clone(),
                    expected: patient.version,
                }
            } else {
                DbError::NotFound(format!("patient {}", patient.patient_id))
            });
        }

        patient.version += 1;
        patient.updated_at = updated_at;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                r#"
                SELECT patient_id, clinic_id, name, phone, email, dental_chart,
                       treatment_plan_ids, visit_ids, version, created_at, updated_at
                FROM patients
                WHERE patient_id = ?
                "#,
                [patient_id],
                |row| {
                    Ok(PatientRow {
                        patient_id: row.get(0)?,
                        clinic_id: row.get(1)?,
                        name: row.get(2)?,
                        phone: row.get(3)?,
                        email: row.get(4)?,
                        dental_chart: row.get(5)?,
                        treatment_plan_ids: row.get(6)?,
                        visit_ids: row.get(7)?,
                        version: row.get(8)?,
                        created_at: row.get(9)?,
                        updated_at: row.get(10)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    pub fn patient_exists(&self, patient_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE patient_id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    patient_id: String,
    clinic_id: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    dental_chart: String,
    treatment_plan_ids: String,
    visit_ids: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let dental_chart: DentalChart = serde_json::from_str(&row.dental_chart)?;

        Ok(Patient {
            patient_id: row.patient_id,
            clinic_id: row.clinic_id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            dental_chart,
            treatment_plan_ids: serde_json::from_str(&row.treatment_plan_ids)?,
            visit_ids: serde_json::from_str(&row.visit_ids)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ToothNumber, ToothRecord};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let mut patient = Patient::new("pat-1".into(), "clinic-1".into(), "Ada".into());
        patient.phone = Some("555-0100".into());
        db.documents().insert_patient(&patient).unwrap();

        let retrieved = db.documents().get_patient("pat-1").unwrap().unwrap();
        assert_eq!(retrieved.name, "Ada");
        assert_eq!(retrieved.phone.as_deref(), Some("555-0100"));
        assert!(retrieved.dental_chart.teeth().is_empty());
    }

    #[test]
    fn test_save_bumps_version_and_persists_chart() {
        let db = setup_db();
        let mut patient = Patient::new("pat-1".into(), "clinic-1".into(), "Ada".into());
        db.documents().insert_patient(&patient).unwrap();

        let mut record = ToothRecord::new(ToothNumber::new(14).unwrap());
        record.conditions.insert("caries".into());
        patient.dental_chart = DentalChart::from(vec![record]);
        db.documents().save_patient(&mut patient).unwrap();
        assert_eq!(patient.version, 1);

        let retrieved = db.documents().get_patient("pat-1").unwrap().unwrap();
        assert_eq!(retrieved.version, 1);
        assert_eq!(retrieved.dental_chart.teeth().len(), 1);
        assert!(retrieved.dental_chart.teeth()[0].conditions.contains("caries"));
    }

    #[test]
    fn test_stale_save_is_write_conflict() {
        let db = setup_db();
        let patient = Patient::new("pat-1".into(), "clinic-1".into(), "Ada".into());
        db.documents().insert_patient(&patient).unwrap();

        let mut first = db.documents().get_patient("pat-1").unwrap().unwrap();
        let mut second = db.documents().get_patient("pat-1").unwrap().unwrap();

        first.link_visit("v1");
        db.documents().save_patient(&mut first).unwrap();

        second.link_visit("v2");
        let err = db.documents().save_patient(&mut second).unwrap_err();
        assert!(matches!(err, DbError::WriteConflict { expected: 0, .. }));

        let stored = db.documents().get_patient("pat-1").unwrap().unwrap();
        assert_eq!(stored.visit_ids, vec!["v1"]);
    }

    #[test]
    fn test_save_missing_patient_is_not_found() {
        let db = setup_db();
        let mut patient = Patient::new("ghost".into(), "clinic-1".into(), "Nobody".into());
        let err = db.documents().save_patient(&mut patient).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}

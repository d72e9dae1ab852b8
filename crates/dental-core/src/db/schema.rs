//! SQLite schema definition.

/// Complete database schema for the patient service.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (dental chart embedded as JSON)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    clinic_id TEXT NOT NULL,
    name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    dental_chart TEXT NOT NULL DEFAULT '[]',        -- JSON array of ToothRecord
    treatment_plan_ids TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    visit_ids TEXT NOT NULL DEFAULT '[]',           -- JSON array of strings
    version INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_clinic ON patients(clinic_id);

-- ============================================================================
-- Treatment Plans
-- ============================================================================

CREATE TABLE IF NOT EXISTS treatment_plans (
    plan_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    clinic_id TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'ongoing', 'completed', 'cancelled')),
    document TEXT NOT NULL,                         -- JSON TreatmentPlan
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_plans_patient ON treatment_plans(patient_id);
CREATE INDEX IF NOT EXISTS idx_plans_status ON treatment_plans(status);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    doctor_id TEXT NOT NULL,
    clinic_id TEXT NOT NULL,
    department TEXT,
    date TEXT NOT NULL,
    time TEXT,
    -- scheduled, confirmed, completed, cancelled, recall
    status TEXT NOT NULL DEFAULT 'scheduled',
    visit_id TEXT,
    previous_visit_id TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id, date);

-- ============================================================================
-- Visits (immutable except treatment_plan_id back-link and status)
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    visit_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    appointment_id TEXT NOT NULL REFERENCES appointments(appointment_id),
    doctor_id TEXT NOT NULL,
    treatment_plan_id TEXT REFERENCES treatment_plans(plan_id),
    status TEXT NOT NULL CHECK (status IN ('open', 'completed')),
    document TEXT NOT NULL,                         -- JSON Visit
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id);
CREATE INDEX IF NOT EXISTS idx_visits_plan ON visits(treatment_plan_id);

-- The plan back-link is written at most once
CREATE TRIGGER IF NOT EXISTS visits_plan_link_once BEFORE UPDATE OF treatment_plan_id ON visits
WHEN old.treatment_plan_id IS NOT NULL AND new.treatment_plan_id IS NOT old.treatment_plan_id
BEGIN
    SELECT RAISE(ABORT, 'Visit treatment plan link is immutable');
END;
"#;

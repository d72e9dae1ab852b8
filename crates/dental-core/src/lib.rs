//! Dental Core Library
//!
//! Dental chart and treatment plan consistency engine for the patient service.
//!
//! # Architecture
//!
//! ```text
//!                    POST /consultation/:appointmentId
//!                                  │
//!                   ┌──────────────▼──────────────┐
//!                   │  ConsultationCoordinator    │
//!                   │  (one UnitOfWork)           │
//!                   └──┬──────────┬────────────┬──┘
//!                      │          │            │
//!                      ▼          ▼            ▼
//!                 ChartStore  TreatmentPlan  visits /
//!                      │      Service        appointments
//!                      ▼          │
//!               conflict check    ▼
//!               (completed     engine + status
//!                treatments)   derivation
//!                      │          │
//!                      └────┬─────┘
//!                           ▼
//!                 SQLite document store
//! ```
//!
//! # Core Principle
//!
//! **A completed treatment is never silently applied twice to the same tooth
//! surface.** Repeats abort the whole consultation with a surface conflict.
//!
//! # Modules
//!
//! - [`db`]: SQLite document store and unit of work
//! - [`models`]: Domain types (Patient, DentalChart, TreatmentPlan, Visit, Appointment)
//! - [`chart`]: Dental chart store and surface conflict detector
//! - [`plan`]: Treatment plan engine with derived statuses
//! - [`consultation`]: All-or-nothing consultation coordinator
//! - [`external`]: Best-effort upstream capabilities (fees, directory, notifications)

pub mod chart;
pub mod consultation;
pub mod db;
pub mod error;
pub mod external;
pub mod models;
pub mod plan;

// Re-export commonly used types
pub use chart::{
    find_conflict, is_surface_treated, ChartStore, ConflictPolicy, SurfaceConflict, WorkContext,
};
pub use consultation::{
    ConsultationCoordinator, ConsultationOutcome, ConsultationRequest, PlanProgress,
};
pub use db::{Database, DbError, UnitOfWork};
pub use error::{DentalError, DentalResult};
pub use models::{
    Appointment, AppointmentStatus, DentalChart, Patient, PlanStatus, ProcedureStatus, StageStatus,
    Surface, ToothNumber, ToothRecord, ToothWork, TreatmentPlan, Visit,
};
pub use plan::TreatmentPlanService;

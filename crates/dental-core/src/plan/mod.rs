//! Treatment plan engine.
//!
//! - [`status`]: pure stage and plan status derivation
//! - [`engine`]: state machine operations on [`TreatmentPlan`](crate::models::TreatmentPlan)
//! - [`TreatmentPlanService`]: load, mutate and save through a unit of work

pub mod engine;
pub mod status;
mod service;

pub use engine::{completed_chart_work, CompletedProcedure};
pub use service::{PlanUpdate, TreatmentPlanService};
pub use status::{derive_plan_status, derive_stage_status, StageProgress};

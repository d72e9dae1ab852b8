//! Dental chart store and surface conflict detector.
//!
//! The chart is mutated in memory by [`DentalChart::apply_work`] and written
//! back whole by [`ChartStore`]. Procedure entries are matched on
//! `(kind, name, surface, treatment plan)` before insert, so a chart never
//! holds two live entries for the same work.

mod apply;
mod conflict;
mod store;

pub use apply::{ConflictPolicy, ProcedureSlot, WorkContext, WorkSummary};
pub use conflict::{find_conflict, is_surface_treated, SurfaceConflict};
pub use store::ChartStore;

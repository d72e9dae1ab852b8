//! Domain models for the patient service.

mod appointment;
mod chart;
mod patient;
mod plan;
mod tooth;
mod visit;

pub use appointment::*;
pub use chart::*;
pub use patient::*;
pub use plan::*;
pub use tooth::*;
pub use visit::*;

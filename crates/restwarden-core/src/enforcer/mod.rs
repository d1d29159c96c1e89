//! Enforcement scheduler: condition evaluation, state machine, runtime wiring.

mod engine;
mod service;

pub use engine::{Action, EnforcementEngine, EnforcementState};
pub use service::EnforcementService;

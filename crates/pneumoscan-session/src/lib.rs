//! Interactive classification session.
//!
//! [`SessionController`] owns all mutable session state. Display code reads
//! [`SessionSnapshot`]s, either pulled with [`SessionController::snapshot`] or
//! pushed through [`SessionController::observe`].

mod controller;
mod snapshot;

pub use controller::{Completion, IdentifyJob, IdentifyOutcome, SessionController, SessionError};
pub use snapshot::SessionSnapshot;

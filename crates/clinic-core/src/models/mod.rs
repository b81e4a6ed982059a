//! Domain models for the clinic service.

mod application;
mod catalog;
mod draft;
mod ledger;
mod package;
mod patient;
mod session;

pub use application::*;
pub use catalog::*;
pub use draft::*;
pub use ledger::*;
pub use package::*;
pub use patient::*;
pub use session::*;

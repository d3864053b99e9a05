//! Prescriber targeting and script-lift projection library
//!
//! This library sizes targeted prescriber audiences, paces a scripted
//! identity-match pass, projects campaign lift for a target medication
//! against its comparison set, and diffs "what-if" audience variants.

pub mod models;
pub mod filters;
pub mod sizing;
pub mod matching;
pub mod lift;
pub mod comparison;
pub mod store;
pub mod campaign;
pub mod example_data;
pub mod errors;

pub use models::*;
pub use sizing::AudienceSizer;
pub use errors::*;

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, TargetingError>;

//! Entry protection scoring.

pub mod protection;
pub mod session;

pub use protection::{score_entry, ProtectionScore, RiskLevel};

//! sw-protocol: Shared types for shellwise.
//!
//! This crate defines the value types passed between the AI backends,
//! the safety pipeline, and the command-line frontend.

pub mod context;
pub mod message;

pub use context::SystemContext;
pub use message::{CommandSuggestion, RiskLevel, UnknownRiskLevel};

//! sw-core: Command safety pipeline and application logic for shellwise.
//!
//! The pipeline is [`parser::CommandParser`] followed by
//! [`safety::SafetyChecker`]; both are pure and synchronous. The remaining
//! modules wire that pipeline to AI providers, execution, history and
//! logging. Exposed as a library for integration testing.

pub mod app;
pub mod audit;
pub mod config;
pub mod engine;
pub mod executor;
pub mod history;
pub mod logging;
pub mod parser;
pub mod safety;

pub use parser::{CommandInfo, CommandParser, ParsedCommand, Redirection};
pub use safety::{SafetyChecker, SafetyPolicy, SafetyResult};
pub use sw_protocol::RiskLevel;

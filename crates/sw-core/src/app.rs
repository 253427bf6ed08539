//! One request through the whole pipeline: generate, parse, check, confirm,
//! execute, record.

use sw_protocol::CommandSuggestion;
use thiserror::Error;

use crate::audit::AuditLogger;
use crate::engine::{CommandEngine, EngineError};
use crate::executor::{ExecError, ExecutionResult, Executor};
use crate::history::{HistoryEntry, HistoryStore};
use crate::parser::{CommandParser, ParsedCommand};
use crate::safety::{SafetyChecker, SafetyResult};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Asks the user whether a command may run.
pub trait Approver {
    fn confirm(&mut self, suggestion: &CommandSuggestion, safety: &SafetyResult) -> bool;
}

/// Approver with a fixed answer.
pub struct FixedApprover(pub bool);

impl Approver for FixedApprover {
    fn confirm(&mut self, _: &CommandSuggestion, _: &SafetyResult) -> bool {
        self.0
    }
}

#[derive(Debug)]
pub enum Outcome {
    Executed(ExecutionResult),
    Blocked,
    Declined,
    DryRun,
}

#[derive(Debug)]
pub struct Turn {
    pub suggestion: CommandSuggestion,
    pub parsed: ParsedCommand,
    pub safety: SafetyResult,
    pub outcome: Outcome,
}

pub struct Assistant {
    engine: CommandEngine,
    parser: CommandParser,
    checker: SafetyChecker,
    executor: Executor,
    history: HistoryStore,
    audit: AuditLogger,
    /// Skip the prompt for commands that do not require confirmation.
    auto_execute: bool,
}

impl Assistant {
    pub fn new(
        engine: CommandEngine,
        checker: SafetyChecker,
        executor: Executor,
        history: HistoryStore,
        audit: AuditLogger,
        auto_execute: bool,
    ) -> Self {
        Self {
            engine,
            parser: CommandParser::new(),
            checker,
            executor,
            history,
            audit,
            auto_execute,
        }
    }

    pub fn engine(&self) -> &CommandEngine {
        &self.engine
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub async fn process_query(
        &mut self,
        query: &str,
        approver: &mut dyn Approver,
        dry_run: bool,
    ) -> Result<Turn, AppError> {
        let recent = self.history.recent_commands(5);
        let suggestion = self.engine.generate_command(query, &recent).await?;
        self.audit
            .log_proposed(&suggestion.command, suggestion.risk_level, &suggestion.provider);

        let parsed = self.parser.parse(&suggestion.command);
        let safety = self.checker.check_command(&parsed, suggestion.risk_level);

        let outcome = self.decide(&suggestion, &parsed, &safety, approver, dry_run).await?;

        if let Outcome::Executed(result) = &outcome {
            let entry = HistoryEntry::new(
                query,
                &suggestion.command,
                &suggestion.explanation,
                result.success,
                &suggestion.provider,
            );
            if let Err(e) = self.history.add_entry(entry) {
                tracing::warn!(error = %e, "failed to save history");
            }
        }

        Ok(Turn {
            suggestion,
            parsed,
            safety,
            outcome,
        })
    }

    async fn decide(
        &mut self,
        suggestion: &CommandSuggestion,
        parsed: &ParsedCommand,
        safety: &SafetyResult,
        approver: &mut dyn Approver,
        dry_run: bool,
    ) -> Result<Outcome, AppError> {
        if safety.is_blocked() {
            tracing::info!(command = %parsed.raw_command, "command blocked");
            self.audit.log_blocked(&parsed.raw_command, &safety.warnings);
            return Ok(Outcome::Blocked);
        }
        if dry_run {
            return Ok(Outcome::DryRun);
        }

        let method = if safety.requires_confirmation || !self.auto_execute {
            if !approver.confirm(suggestion, safety) {
                self.audit.log_denied(&parsed.raw_command, "user");
                return Ok(Outcome::Declined);
            }
            "user"
        } else {
            "auto"
        };
        self.audit.log_approved(&parsed.raw_command, method);

        let result = self.executor.execute(parsed, safety.sandbox).await?;
        self.audit.log_executed(
            &parsed.raw_command,
            result.exit_code,
            result.duration.as_millis() as u64,
            safety.sandbox,
        );
        Ok(Outcome::Executed(result))
    }
}

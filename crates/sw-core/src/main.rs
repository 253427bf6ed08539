use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::{CommandFactory, Parser};
use dialoguer::Confirm;
use sw_backend::{Provider, ProviderRegistry};
use sw_core::app::{Approver, Assistant, Outcome, Turn};
use sw_core::audit::AuditLogger;
use sw_core::config::{config_path, Config};
use sw_core::engine::CommandEngine;
use sw_core::executor::Executor;
use sw_core::history::HistoryStore;
use sw_core::{logging, CommandParser, RiskLevel, SafetyChecker, SafetyResult};
use sw_protocol::{CommandSuggestion, SystemContext};

/// Turn plain-English requests into shell commands, checked before they run.
#[derive(Parser, Debug)]
#[command(name = "shellwise", version, long_about = None)]
struct Cli {
    /// Interactive chat mode
    #[arg(long)]
    chat: bool,

    /// Explain an existing command
    #[arg(long, value_name = "CMD")]
    explain: Option<String>,

    /// Print a safety report for a command as JSON, without AI
    #[arg(long, value_name = "CMD")]
    check: Option<String>,

    /// Show the most recent history entries
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    history: Option<usize>,

    /// Search history
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,

    /// Print the effective configuration
    #[arg(long = "config")]
    show_config: bool,

    /// Check which providers can be constructed
    #[arg(long)]
    doctor: bool,

    /// Provider to try first (overrides config)
    #[arg(short, long)]
    provider: Option<String>,

    /// Risk level assumed by --check
    #[arg(short, long, default_value = "low")]
    risk: RiskLevel,

    /// Run commands that need no confirmation without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Show what would run, never execute
    #[arg(long)]
    dry_run: bool,

    /// Request in plain English
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();

    let guard = match logging::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e}");
            None
        }
    };

    let code = dispatch(&cli, &config);

    // flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}

fn dispatch(cli: &Cli, config: &Config) -> i32 {
    if let Some(command) = &cli.check {
        return run_check(command, cli.risk, config);
    }
    if cli.show_config {
        return run_show_config(config);
    }
    if let Some(n) = cli.history {
        return run_history(config, n);
    }
    if let Some(text) = &cli.search {
        return run_search(config, text);
    }
    if cli.doctor {
        return run_doctor(config);
    }

    let query = cli.query.join(" ");
    if cli.explain.is_none() && !cli.chat && query.trim().is_empty() {
        let _ = Cli::command().print_help();
        return 2;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            return 1;
        }
    };

    let registry = ProviderRegistry::builtin();
    let providers = build_providers(&registry, config, cli.provider.as_deref());
    let engine = CommandEngine::new(providers, SystemContext::gather());

    if let Some(command) = &cli.explain {
        return match runtime.block_on(engine.explain_command(command)) {
            Ok(text) => {
                println!("{text}");
                0
            }
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        };
    }

    let mut assistant = assistant(engine, config, cli.yes);
    let mut approver = PromptApprover;

    if cli.chat {
        runtime.block_on(chat(&mut assistant, &mut approver, cli.dry_run))
    } else {
        runtime.block_on(one_shot(&mut assistant, &mut approver, &query, cli.dry_run))
    }
}

// --- Wiring ---

/// Preferred provider first; with `fallback_chain` the remaining backends
/// follow and the keyword fallback goes last.
fn build_providers(
    registry: &ProviderRegistry,
    config: &Config,
    preferred: Option<&str>,
) -> Vec<Box<dyn Provider>> {
    let preferred = preferred.unwrap_or(config.provider.default.as_str());
    let mut order: Vec<&'static str> = Vec::new();
    let preferred_name = registry.canonical_name(preferred);
    match preferred_name {
        Some(name) => order.push(name),
        None => eprintln!("warning: unknown provider '{preferred}'"),
    }
    if config.provider.fallback_chain {
        for name in registry.names() {
            if name != "fallback" && !order.contains(&name) {
                order.push(name);
            }
        }
        if !order.contains(&"fallback") {
            order.push("fallback");
        }
    }

    let mut providers = Vec::new();
    for name in order {
        let built = config
            .provider_settings(name)
            .and_then(|settings| registry.build(name, &settings));
        match built {
            Ok(provider) => providers.push(provider),
            Err(e) if Some(name) == preferred_name => {
                eprintln!("warning: {e}");
                tracing::warn!(provider = name, error = %e, "preferred provider unavailable");
            }
            Err(e) => tracing::debug!(provider = name, error = %e, "provider skipped"),
        }
    }
    tracing::info!(
        providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "provider chain"
    );
    providers
}

fn assistant(engine: CommandEngine, config: &Config, yes: bool) -> Assistant {
    let history = if config.history.enabled {
        HistoryStore::load(&config.history.resolve_path(), config.history.max_entries)
    } else {
        HistoryStore::in_memory(config.history.max_entries)
    };

    let audit = if config.audit.enabled {
        let path = config.audit.resolve_path();
        AuditLogger::new(&path).unwrap_or_else(|e| {
            eprintln!("warning: audit log disabled ({}): {e}", path.display());
            AuditLogger::noop()
        })
    } else {
        AuditLogger::noop()
    };

    Assistant::new(
        engine,
        SafetyChecker::new(config.safety.policy()),
        Executor::new(
            config.executor.shell.clone(),
            Duration::from_secs(config.executor.timeout_secs),
        ),
        history,
        audit,
        config.safety.auto_execute || yes,
    )
}

fn load_history(config: &Config) -> HistoryStore {
    HistoryStore::load(&config.history.resolve_path(), config.history.max_entries)
}

// --- Commands ---

fn run_check(command: &str, risk: RiskLevel, config: &Config) -> i32 {
    let parser = CommandParser::new();
    let parsed = parser.parse(command);
    let safety = SafetyChecker::new(config.safety.policy()).check_command(&parsed, risk);
    let (destructive, destructive_warnings) = parser.is_destructive(command);
    let (syntax_ok, syntax_errors) = parser.validate_syntax(command);

    let report = serde_json::json!({
        "parsed": parsed,
        "info": parser.get_command_info(&parsed),
        "safety": safety,
        "destructive": { "detected": destructive, "warnings": destructive_warnings },
        "syntax": { "valid": syntax_ok, "errors": syntax_errors },
    });
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    }
    if safety.allow_execution {
        0
    } else {
        1
    }
}

fn run_show_config(config: &Config) -> i32 {
    match toml::to_string_pretty(config) {
        Ok(text) => {
            println!("# {}", config_path().display());
            print!("{text}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn run_history(config: &Config, n: usize) -> i32 {
    let history = load_history(config);
    if history.is_empty() {
        println!("No history yet.");
    }
    for entry in history.recent(n) {
        let mark = if entry.success { "ok" } else { "failed" };
        println!("[{mark}] {}  ->  {}", entry.query, entry.command);
    }
    0
}

fn run_search(config: &Config, text: &str) -> i32 {
    let history = load_history(config);
    let hits = history.search(text);
    if hits.is_empty() {
        println!("No matches for '{text}'.");
        return 1;
    }
    for entry in hits {
        println!("{}  ->  {}", entry.query, entry.command);
    }
    0
}

fn run_doctor(config: &Config) -> i32 {
    let registry = ProviderRegistry::builtin();
    let mut ready = 0;
    for name in registry.names() {
        let result = config
            .provider_settings(name)
            .and_then(|settings| registry.build(name, &settings));
        match result {
            Ok(_) => {
                ready += 1;
                println!("  ok       {name}");
            }
            Err(e) => println!("  missing  {name}: {e}"),
        }
    }
    println!();
    println!("preferred provider: {}", config.provider.default);
    println!("fallback chain:     {}", config.provider.fallback_chain);
    if ready > 0 {
        0
    } else {
        1
    }
}

async fn one_shot(
    assistant: &mut Assistant,
    approver: &mut dyn Approver,
    query: &str,
    dry_run: bool,
) -> i32 {
    match assistant.process_query(query, approver, dry_run).await {
        Ok(turn) => report_turn(&turn),
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

async fn chat(assistant: &mut Assistant, approver: &mut dyn Approver, dry_run: bool) -> i32 {
    println!("shellwise chat. Type 'help' for commands, 'exit' to leave.");
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("shellwise> ");
        let _ = io::stdout().flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        }

        let input = line.trim();
        match input.to_ascii_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" | "bye" => break,
            "help" => {
                println!("  <request>   describe what you want to do");
                println!("  history     show recent commands");
                println!("  exit        leave chat (also quit, bye)");
                continue;
            }
            "history" => {
                for entry in assistant.history().recent(10) {
                    println!("  {}  ->  {}", entry.query, entry.command);
                }
                continue;
            }
            _ => {}
        }

        match assistant.process_query(input, approver, dry_run).await {
            Ok(turn) => {
                report_turn(&turn);
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    0
}

// --- Output ---

fn print_suggestion(suggestion: &CommandSuggestion, safety: &SafetyResult) {
    println!();
    println!("  command:  {}", suggestion.command);
    if !suggestion.explanation.is_empty() {
        println!("  what:     {}", suggestion.explanation);
    }
    println!(
        "  risk:     {} (confidence {:.0}%, via {})",
        safety.risk_level.label(),
        suggestion.confidence * 100.0,
        suggestion.provider
    );
    for warning in &safety.warnings {
        println!("  warning:  {warning}");
    }
    for alternative in &suggestion.alternatives {
        println!("  alt:      {alternative}");
    }
    if !suggestion.prerequisites.is_empty() {
        println!("  needs:    {}", suggestion.prerequisites.join(", "));
    }
    println!();
}

fn report_turn(turn: &Turn) -> i32 {
    match &turn.outcome {
        Outcome::Executed(result) => {
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            if result.success {
                0
            } else {
                eprintln!("[exit code: {}]", result.exit_code.unwrap_or(-1));
                result.exit_code.unwrap_or(1)
            }
        }
        Outcome::Blocked => {
            print_suggestion(&turn.suggestion, &turn.safety);
            eprintln!("Command blocked by safety policy.");
            1
        }
        Outcome::Declined => {
            println!("Cancelled.");
            0
        }
        Outcome::DryRun => {
            print_suggestion(&turn.suggestion, &turn.safety);
            println!("(dry run, not executed)");
            0
        }
    }
}

/// Interactive yes/no prompt on the terminal.
struct PromptApprover;

impl Approver for PromptApprover {
    fn confirm(&mut self, suggestion: &CommandSuggestion, safety: &SafetyResult) -> bool {
        print_suggestion(suggestion, safety);
        let prompt = if safety.requires_confirmation {
            "This command needs confirmation. Run it?"
        } else {
            "Run this command?"
        };
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

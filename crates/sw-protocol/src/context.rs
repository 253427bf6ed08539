//! Host context included in generation prompts.

use serde::{Deserialize, Serialize};

/// Describes the machine the generated command will run on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemContext {
    pub os: String,
    pub arch: String,
    pub shell: String,
    pub user: String,
    pub cwd: String,
}

impl Default for SystemContext {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            shell: "/bin/sh".to_string(),
            user: "unknown".to_string(),
            cwd: "/".to_string(),
        }
    }
}

impl SystemContext {
    /// Gather context from the current process environment.
    pub fn gather() -> Self {
        let defaults = Self::default();
        Self {
            shell: std::env::var("SHELL").unwrap_or(defaults.shell),
            user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or(defaults.user),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or(defaults.cwd),
            ..defaults
        }
    }
}

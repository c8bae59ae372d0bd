//! Acting-user resolution for roster commands.
//!
//! The resolution chain: `--user` flag > `DUTYCAL_USER` env > `USER` env (TTY only).
//! Commands that change ownership require a user; read-only commands work without one.

use std::env;

/// Errors from user resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserResolutionError {
    /// Human-readable description.
    pub message: String,
    /// Machine error code.
    pub code: &'static str,
}

impl std::fmt::Display for UserResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(user) = cli_flag.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    if let Some(val) = env.get("DUTYCAL_USER") {
        return Some(val);
    }

    // A login name is only trusted interactively.
    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the acting user, or an error naming the ways to set one.
pub fn require_user(cli_flag: Option<&str>) -> Result<String, UserResolutionError> {
    resolve_user_with(cli_flag, &RealEnv).ok_or_else(|| UserResolutionError {
        message: "Acting user required for this command. \
                  Set --user or the DUTYCAL_USER environment variable."
            .to_string(),
        code: "missing_user",
    })
}

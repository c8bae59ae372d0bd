//! Subcommand handlers. Each `run_*` renders its own result and errors.

pub mod alert;
pub mod create;
pub mod generate;
pub mod roster;
pub mod show;
pub mod upcoming;
pub mod week;

use crate::output::{CliError, OutputMode, render_error};
use crate::user;
use dutycal_core::StoreError;
use dutycal_core::roster::RosterError;

/// Render `error` and turn it into the command's failure.
pub fn fail<T>(output: OutputMode, error: &CliError) -> anyhow::Result<T> {
    render_error(output, error)?;
    anyhow::bail!("{}", error.message)
}

pub fn store_failure<T>(output: OutputMode, err: &StoreError) -> anyhow::Result<T> {
    fail(output, &CliError::from(err))
}

pub fn roster_failure<T>(output: OutputMode, err: &RosterError) -> anyhow::Result<T> {
    match err {
        RosterError::Store(inner) => store_failure(output, inner),
        RosterError::NotOwner { .. } => fail(
            output,
            &CliError::with_code(err.to_string(), err.code())
                .suggest("only the current owner can release or delete a shift"),
        ),
        RosterError::Required { .. } => fail(
            output,
            &CliError::with_code(err.to_string(), err.code())
                .suggest("use `dutycal disclaim` to release a required shift"),
        ),
        RosterError::AnonymousUser => fail(output, &CliError::with_code(err.to_string(), err.code())),
    }
}

pub fn require_user(output: OutputMode, user_flag: Option<&str>) -> anyhow::Result<String> {
    match user::require_user(user_flag) {
        Ok(user) => Ok(user),
        Err(e) => fail(
            output,
            &CliError::with_code(&e.message, e.code).suggest("Set --user or DUTYCAL_USER"),
        ),
    }
}

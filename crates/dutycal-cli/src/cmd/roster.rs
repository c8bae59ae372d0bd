//! `dutycal take`, `dutycal disclaim`, `dutycal delete` — ownership changes
//! made on behalf of the acting user.

use crate::cmd::{require_user, roster_failure};
use crate::context::Context;
use crate::output::{EventRow, OutputMode, render_mode};
use clap::Args;
use std::io::Write;
use dutycal_core::roster;

#[derive(Args, Debug)]
pub struct RosterArgs {
    /// Event ID.
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterAction {
    Take,
    Disclaim,
    Delete,
}

impl RosterAction {
    const fn verb(self) -> &'static str {
        match self {
            Self::Take => "Took",
            Self::Disclaim => "Released",
            Self::Delete => "Deleted",
        }
    }
}

pub fn run_roster(
    action: RosterAction,
    args: &RosterArgs,
    user_flag: Option<&str>,
    ctx: &Context,
    output: OutputMode,
) -> anyhow::Result<()> {
    let user = require_user(output, user_flag)?;
    let result = match action {
        RosterAction::Take => roster::take(&ctx.store, &args.id, &user),
        RosterAction::Disclaim => roster::disclaim(&ctx.store, &args.id, &user),
        RosterAction::Delete => roster::remove(&ctx.store, &args.id, &user),
    };
    let event = match result {
        Ok(event) => event,
        Err(err) => return roster_failure(output, &err),
    };

    render_mode(
        output,
        &EventRow::from(&event),
        |row, w| writeln!(w, "{}\t{}", action.verb().to_lowercase(), row.id),
        |row, w| writeln!(w, "{} {} ({})", action.verb(), row.title, row.start),
    )
}

//! `dutycal upcoming` — the next events of the current week bucket.

use crate::cmd::{require_user, store_failure};
use crate::context::Context;
use crate::output::{EventRow, OutputMode, render_events};
use clap::Args;
use dutycal_core::calendar::upcoming;

#[derive(Args, Debug)]
pub struct UpcomingArgs {
    /// Only shifts nobody has taken.
    #[arg(long, conflicts_with = "mine")]
    pub open: bool,

    /// Only shifts owned by the acting user.
    #[arg(long)]
    pub mine: bool,

    /// Row cap; defaults to the configured list limit.
    #[arg(long)]
    pub limit: Option<u32>,
}

pub fn run_upcoming(
    args: &UpcomingArgs,
    user_flag: Option<&str>,
    ctx: &Context,
    output: OutputMode,
) -> anyhow::Result<()> {
    let calendar = &ctx.config.calendar;
    let (owner, default_limit) = if args.mine {
        (
            Some(require_user(output, user_flag)?),
            calendar.user_events_limit,
        )
    } else if args.open {
        (Some(String::new()), calendar.upcoming_events_limit)
    } else {
        (None, calendar.upcoming_events_limit)
    };

    let events = match upcoming(
        &ctx.store,
        ctx.now(),
        owner.as_deref(),
        args.limit.unwrap_or(default_limit),
    ) {
        Ok(events) => events,
        Err(err) => return store_failure(output, &err),
    };
    let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
    render_events(output, &rows)
}

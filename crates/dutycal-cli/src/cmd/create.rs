//! `dutycal create` — add a one-off event.
//!
//! Without `--id` the row key is derived from title, start and duration, so
//! creating the same shift twice rewrites one row.

use crate::cmd::{fail, store_failure};
use crate::context::{Context, parse_duration, parse_local_time};
use crate::output::{CliError, EventRow, OutputMode, render_mode};
use clap::Args;
use std::io::Write;
use dutycal_core::{Event, NewEvent};
use tracing::info;
use url::Url;

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long, short = 'd')]
    pub description: String,

    /// Local start, `YYYY-MM-DD HH:MM`, or an RFC 3339 instant.
    #[arg(long)]
    pub start: String,

    /// `HH:MM`, `90m` or `2h`.
    #[arg(long, default_value = "1h")]
    pub duration: String,

    /// Owner; leave unset for an open shift.
    #[arg(long, default_value = "")]
    pub owner: String,

    /// Mark the shift as one that must be covered.
    #[arg(long)]
    pub required: bool,

    /// Absolute URL with details.
    #[arg(long)]
    pub reference: Option<String>,

    /// Explicit row key instead of the derived one.
    #[arg(long)]
    pub id: Option<String>,
}

fn build_event(args: &CreateArgs, ctx: &Context) -> anyhow::Result<Event> {
    let reference = args
        .reference
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid --reference: {e}"))?;

    let mut event = Event::create(
        NewEvent {
            title: args.title.clone(),
            description: args.description.clone(),
            owner: args.owner.clone(),
            start: parse_local_time(&args.start, ctx.zone())?,
            duration: parse_duration(&args.duration)?,
            reference,
            required: args.required,
        },
        ctx.zone(),
    );
    if let Some(id) = &args.id {
        event.id.clone_from(id);
    }
    Ok(event)
}

pub fn run_create(args: &CreateArgs, ctx: &Context, output: OutputMode) -> anyhow::Result<()> {
    let mut event = match build_event(args, ctx) {
        Ok(event) => event,
        Err(e) => return fail(output, &CliError::with_code(format!("{e:#}"), "invalid_args")),
    };
    if let Err(err) = ctx.store.sync(&mut event) {
        return store_failure(output, &err);
    }
    info!(id = %event.id, title = %event.title, "event created");

    render_mode(
        output,
        &EventRow::from(&event),
        |row, w| writeln!(w, "{}", row.id),
        |row, w| {
            writeln!(w, "Created {}", row.id)?;
            row.write_pretty(w)
        },
    )
}

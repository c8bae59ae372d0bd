//! `dutycal alert` — required shifts nobody has taken yet.
//!
//! Each configured notification looks ahead its own number of days; the
//! report lists what would be sent, delivery itself is left to the caller.

use crate::cmd::{fail, store_failure};
use crate::context::{Context, parse_local_time};
use crate::output::{CliError, EventRow, OutputMode, pretty_section, render_mode};
use clap::Args;
use dutycal_core::calendar::uncovered_events;
use dutycal_core::config::Notification;
use serde::Serialize;
use std::io::Write;
use tracing::warn;

const DEFAULT_LOOKAHEAD_DAYS: u32 = 3;

#[derive(Args, Debug)]
pub struct AlertArgs {
    /// Only evaluate this notification.
    #[arg(long)]
    pub notification: Option<String>,

    /// Ignore configured notifications and look this many days ahead.
    #[arg(long, conflicts_with = "notification")]
    pub lookahead: Option<u32>,

    /// Evaluate as of this local time instead of now.
    #[arg(long)]
    pub now: Option<String>,

    /// Exit with status 1 when any shift is uncovered.
    #[arg(long)]
    pub fail_on_uncovered: bool,
}

#[derive(Debug, Serialize)]
pub struct AlertOutput {
    pub notification: String,
    pub lookahead_days: u32,
    pub uncovered: Vec<EventRow>,
}

fn selected(args: &AlertArgs, ctx: &Context) -> anyhow::Result<Vec<Notification>> {
    if let Some(days) = args.lookahead {
        return Ok(vec![Notification {
            name: "adhoc".into(),
            warning_lookahead_days: days,
        }]);
    }
    let configured = &ctx.config.notifications;
    if let Some(name) = &args.notification {
        return configured
            .iter()
            .find(|n| &n.name == name)
            .cloned()
            .map(|n| vec![n])
            .ok_or_else(|| anyhow::anyhow!("no notification named {name:?}"));
    }
    if configured.is_empty() {
        return Ok(vec![Notification {
            name: "default".into(),
            warning_lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }]);
    }
    Ok(configured.clone())
}

pub fn run_alert(args: &AlertArgs, ctx: &Context, output: OutputMode) -> anyhow::Result<()> {
    let notifications = match selected(args, ctx) {
        Ok(n) => n,
        Err(e) => return fail(output, &CliError::with_code(format!("{e:#}"), "invalid_args")),
    };
    let now = match args.now.as_deref().map(|t| parse_local_time(t, ctx.zone())) {
        None => ctx.now(),
        Some(Ok(now)) => now,
        Some(Err(e)) => {
            return fail(output, &CliError::with_code(format!("{e:#}"), "invalid_args"));
        }
    };

    let mut outputs = Vec::with_capacity(notifications.len());
    for notification in notifications {
        let events =
            match uncovered_events(&ctx.store, now, notification.warning_lookahead_days) {
                Ok(events) => events,
                Err(err) => return store_failure(output, &err),
            };
        if !events.is_empty() {
            warn!(
                notification = %notification.name,
                count = events.len(),
                "required shifts uncovered"
            );
        }
        outputs.push(AlertOutput {
            notification: notification.name,
            lookahead_days: notification.warning_lookahead_days,
            uncovered: events.iter().map(EventRow::from).collect(),
        });
    }

    render_mode(
        output,
        &outputs,
        |outputs, w| {
            for out in outputs {
                for row in &out.uncovered {
                    write!(w, "{}\t", out.notification)?;
                    row.write_text(w)?;
                }
            }
            Ok(())
        },
        |outputs, w| {
            for out in outputs {
                pretty_section(
                    w,
                    &format!(
                        "{}: {} uncovered in the next {} day(s)",
                        out.notification,
                        out.uncovered.len(),
                        out.lookahead_days
                    ),
                )?;
                for row in &out.uncovered {
                    writeln!(w, "  {}  {}  ({})", row.start, row.title, row.id)?;
                }
                writeln!(w)?;
            }
            Ok(())
        },
    )?;

    if args.fail_on_uncovered && outputs.iter().any(|o| !o.uncovered.is_empty()) {
        anyhow::bail!("uncovered required shifts");
    }
    Ok(())
}

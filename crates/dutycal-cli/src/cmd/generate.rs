//! `dutycal generate` — materialize recurring shifts up to the horizon.
//!
//! Safe to run repeatedly (e.g. from cron): occurrences that already exist
//! are recognized by their generator fingerprint and skipped.

use crate::cmd::fail;
use crate::context::{Context, parse_date};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use dutycal_core::Scheduler;
use dutycal_core::scheduler::ScheduleError;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// First day to consider, `YYYY-MM-DD`; defaults to today.
    #[arg(long)]
    pub start: Option<String>,

    /// Override the configured schedule-ahead days for rules without their own.
    #[arg(long)]
    pub ahead: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RuleOutcome {
    pub title: String,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

pub fn run_generate(args: &GenerateArgs, ctx: &Context, output: OutputMode) -> anyhow::Result<()> {
    let start = match args.start.as_deref() {
        Some(day) => match parse_date(day, ctx.zone()) {
            Ok(start) => start,
            Err(e) => {
                return fail(output, &CliError::with_code(format!("{e:#}"), "invalid_args"));
            }
        },
        None => ctx.now(),
    };

    let rules = &ctx.config.recurring_events;
    let ahead = args
        .ahead
        .unwrap_or(ctx.config.recurrence.schedule_ahead_days);
    let scheduler = Scheduler::new(&ctx.store, ahead);
    let reports = match scheduler.schedule_all_exclusive(
        &ctx.config.lock_path(),
        ctx.config.recurrence.lock_timeout(),
        rules,
        start,
    ) {
        Ok(reports) => reports,
        Err(err) => {
            let suggestion = match &err {
                ScheduleError::Lock(lock) => lock.hint(),
                ScheduleError::Store { source, .. } => source.hint(),
            };
            let mut cli = CliError::with_code(err.to_string(), err.code());
            if let Some(hint) = suggestion {
                cli = cli.suggest(hint);
            }
            return fail(output, &cli);
        }
    };

    let outcomes: Vec<RuleOutcome> = rules
        .iter()
        .zip(reports)
        .map(|(rule, report)| RuleOutcome {
            title: rule.title.clone(),
            created: report.created,
            existing: report.existing,
            failed: report.failed,
        })
        .collect();

    render_mode(
        output,
        &outcomes,
        |rows, w| {
            for row in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    row.title, row.created, row.existing, row.failed
                )?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Scheduled {} rule(s)", rows.len()))?;
            for row in rows {
                pretty_kv(
                    w,
                    &row.title,
                    format!(
                        "{} created, {} existing, {} failed",
                        row.created, row.existing, row.failed
                    ),
                )?;
            }
            Ok(())
        },
    )
}

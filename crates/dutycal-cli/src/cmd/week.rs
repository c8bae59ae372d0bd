//! `dutycal week` — one week bucket split into local days.

use crate::cmd::{fail, store_failure};
use crate::context::{Context, parse_date};
use crate::output::{CliError, EventRow, OutputMode, pretty_section, render_mode};
use clap::Args;
use dutycal_core::calendar::week_view;
use dutycal_core::week::week_of;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct WeekArgs {
    /// Week bucket number; defaults to the current week.
    #[arg(conflicts_with = "date")]
    pub week: Option<i64>,

    /// Any day of the week to show, `YYYY-MM-DD`.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DayOutput {
    pub date: String,
    pub events: Vec<EventRow>,
}

#[derive(Debug, Serialize)]
pub struct WeekOutput {
    pub week: i64,
    pub start: String,
    pub previous_week: i64,
    pub next_week: i64,
    pub days: Vec<DayOutput>,
}

fn resolve_week(args: &WeekArgs, ctx: &Context) -> anyhow::Result<i64> {
    if let Some(week) = args.week {
        return Ok(week);
    }
    let day = match args.date.as_deref() {
        Some(date) => parse_date(date, ctx.zone())?,
        None => ctx.now(),
    };
    Ok(week_of(&day))
}

pub fn run_week(args: &WeekArgs, ctx: &Context, output: OutputMode) -> anyhow::Result<()> {
    let week = match resolve_week(args, ctx) {
        Ok(week) => week,
        Err(e) => return fail(output, &CliError::with_code(format!("{e:#}"), "invalid_args")),
    };
    let view = match week_view(&ctx.store, week) {
        Ok(view) => view,
        Err(err) => return store_failure(output, &err),
    };

    let out = WeekOutput {
        week: view.week,
        start: view.start.to_rfc3339(),
        previous_week: view.previous_week(),
        next_week: view.next_week(),
        days: view
            .days
            .iter()
            .map(|day| DayOutput {
                date: day.date.format("%Y-%m-%d").to_string(),
                events: day.events.iter().map(EventRow::from).collect(),
            })
            .collect(),
    };

    render_mode(
        output,
        &out,
        |out, w| {
            for day in &out.days {
                for row in &day.events {
                    write!(w, "{}\t", day.date)?;
                    row.write_text(w)?;
                }
            }
            Ok(())
        },
        |out, w| {
            pretty_section(w, &format!("Week {} (from {})", out.week, out.start))?;
            for day in &out.days {
                writeln!(w, "{}", day.date)?;
                if day.events.is_empty() {
                    writeln!(w, "  -")?;
                }
                for row in &day.events {
                    let owner = if row.owner.is_empty() { "open" } else { row.owner.as_str() };
                    let clock = row.start.get(11..16).unwrap_or(&row.start);
                    writeln!(w, "  {clock}  {:<24} {} [{owner}]", row.title, row.duration)?;
                }
            }
            writeln!(w)?;
            writeln!(w, "previous: {}  next: {}", out.previous_week, out.next_week)
        },
    )
}

//! `dutycal show` — display one event.

use crate::cmd::store_failure;
use crate::context::Context;
use crate::output::{EventRow, OutputMode, render_mode};
use clap::Args;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Event ID.
    pub id: String,

    /// Read at quorum instead of from one replica.
    #[arg(long)]
    pub quorum: bool,
}

pub fn run_show(args: &ShowArgs, ctx: &Context, output: OutputMode) -> anyhow::Result<()> {
    let event = match ctx.store.fetch(&args.id, args.quorum) {
        Ok(event) => event,
        Err(err) => return store_failure(output, &err),
    };
    render_mode(
        output,
        &EventRow::from(&event),
        |row, w| row.write_text(w),
        |row, w| row.write_pretty(w),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ShowArgs,
    }

    #[test]
    fn show_args_parse_id_and_quorum() {
        let w = Wrapper::parse_from(["test", "0000B03:abc", "--quorum"]);
        assert_eq!(w.args.id, "0000B03:abc");
        assert!(w.args.quorum);
    }
}

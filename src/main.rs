pub mod cli;
pub mod logger;
pub mod report;
pub mod storage;
pub mod supply;

use crate::{
    cli::{run, Cli},
    supply::SupplyError,
};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    if let Err(e) = logger::init(cli.verbose) {
        eprintln!("{}", e);
    }
    match run(cli) {
        Ok(outcome) => report::outcome(&outcome),
        Err(e) => {
            report::error(e.as_ref());
            std::process::exit(SupplyError::exit_code_of(e.as_ref()));
        }
    }
}

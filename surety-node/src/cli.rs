use std::path::PathBuf;

use clap::{Parser, Subcommand};
use surety_common::StatusCode;

#[derive(Parser, Debug)]
#[command(name = "surety-node")]
#[command(about = "Flight Surety governance node")]
pub struct Cli {
    /// JSON config file; built-in defaults are used when absent
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one flight end to end against an in-memory ledger
    Simulate {
        /// Airlines to onboard, genesis included
        #[arg(long, default_value_t = 5)]
        airlines: usize,
        #[arg(long, default_value_t = 20)]
        oracles: usize,
        #[arg(long, default_value = "ND1309")]
        flight: String,
        /// Seed for the simulated oracles' answers
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Make every oracle report this code (0, 10, 20, 30, 40 or 50)
        #[arg(long, value_parser = parse_status_code)]
        status: Option<StatusCode>,
        /// Print the final ledger state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Write the default configuration to a file
    InitConfig {
        #[arg(value_name = "FILE", default_value = "surety.json")]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub fn parse_status_code(raw: &str) -> Result<StatusCode, String> {
    let code: u8 = raw.parse().map_err(|_| format!("`{raw}` is not a status code"))?;
    StatusCode::try_from(code).map_err(|code| format!("unknown status code {code}"))
}

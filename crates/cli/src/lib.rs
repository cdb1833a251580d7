pub mod commands;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "funnel",
    about = "Funnel landing forecast operator CLI",
    long_about = "Inspect config and readiness, apply migrations, and compute or simulate the \
                  weighted revenue landing for a period.",
    after_help = "Examples:\n  funnel doctor --json\n  funnel landing --year 2026 --quarter 2\n  \
                  funnel simulate --year 2026 --quotation 2=0.7 --opportunity 3=0.4"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, CRM token readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the landing for a year or quarter, served from the snapshot cache")]
    Landing {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        quarter: Option<u8>,
        #[arg(long, help = "Recompute from the CRM regardless of snapshot age")]
        sync: bool,
    },
    #[command(about = "Compute a what-if landing with override weights; nothing is saved")]
    Simulate {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        quarter: Option<u8>,
        #[arg(
            long = "quotation",
            value_name = "CODE=WEIGHT",
            value_parser = commands::simulate::parse_override,
            help = "Quotation status weight; repeatable"
        )]
        quotation_weights: Vec<(String, Decimal)>,
        #[arg(
            long = "opportunity",
            value_name = "CODE=WEIGHT",
            value_parser = commands::simulate::parse_override,
            help = "Opportunity stage weight; repeatable"
        )]
        opportunity_weights: Vec<(String, Decimal)>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Landing { year, quarter, sync } => commands::landing::run(year, quarter, sync),
        Command::Simulate { year, quarter, quotation_weights, opportunity_weights } => {
            commands::simulate::run(year, quarter, quotation_weights, opportunity_weights)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

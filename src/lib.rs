pub mod clean;
pub mod cli;
pub mod columns;
pub mod combine;
pub mod diff;
pub mod error;
pub mod export;
pub mod frame;
pub mod infer;
pub mod ingest;
pub mod io_utils;
pub mod jobs;
pub mod pipeline;
pub mod preview;
pub mod stats;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tablekit", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => preview::execute(&args),
        Commands::Transform(args) => pipeline::execute(&args),
        Commands::Clean(args) => clean::execute(&args),
        Commands::Combine(args) => combine::execute(&args),
        Commands::Diff(args) => diff::execute(&args),
        Commands::Export(args) => export::execute(&args),
    }
}

pub mod clean;
pub mod cli;
pub mod data;
pub mod frame;
pub mod io_utils;
pub mod load;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::Cli;

pub use crate::clean::{CleanOptions, clean, clean_with_options};
pub use crate::frame::Frame;
pub use crate::load::LoadError;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("retail_cleanse", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    clean::execute(&cli)
}

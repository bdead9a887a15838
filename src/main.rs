mod app;
mod catalog;
mod cli;
mod client;
mod config;
mod db;
mod http;
mod kv;
mod packs;
mod paths;
mod worker;

#[cfg(test)]
mod testutil;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = cli::Cli::parse();
    app::run(cli)
}

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod app;
mod cli;
mod view;

use anyhow::Result;
use clap::Parser;

use netpol_check_k8s::Session;

use crate::cli::{Cli, Commands};
use crate::view::Verbosity;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let Cli {
        log_level,
        log_format,
        client,
        verbose,
        command,
    } = Cli::parse();

    log_format
        .try_init(log_level)
        .expect("must configure logging");

    let client = client.try_client().await?;
    let app = app::App::new(Session::new(client), Verbosity::from_flags(verbose));

    match command {
        Commands::Eval(args) => app.check_access(args).await,
        Commands::Inspect(args) => app.inspect(args).await,
    }
}

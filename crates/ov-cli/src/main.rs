mod cli;
mod commands;
mod providers;

use clap::Parser;
use cli::Cli;
use ov_core::config::load_cli_config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    let config = match load_cli_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    };

    let code = commands::run(&config, &cli.root, cli.command).await;
    std::process::exit(code);
}

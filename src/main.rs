mod ai;
mod analytics;
mod app;
mod cache;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;

use app::App;
use cli::{parse_args, Command};
use config::Config;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, cli::USAGE);
            std::process::exit(2);
        }
    };

    if invocation.command == Command::Help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    let config = Config::load()?;

    let result = if invocation.ephemeral {
        App::ephemeral(&config)?.run(invocation.command).await
    } else {
        App::open(&config).await?.run(invocation.command).await
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

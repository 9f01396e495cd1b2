//! trustline CLI entry point

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = trustline::Cli::parse();

    if let Err(e) = trustline::run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

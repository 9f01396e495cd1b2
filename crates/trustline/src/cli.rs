//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// trustline - OpenID Connect trust triangle
///
/// Runs one party of the triangle against an identity provider using
/// private_key_jwt client authentication.
#[derive(Parser, Debug)]
#[command(name = "trustline", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(
        short,
        long,
        global = true,
        env = "TRUSTLINE_CONFIG",
        default_value = "trustline.toml"
    )]
    pub config: PathBuf,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resource server validating bearer tokens on GET /foo
    Api,
    /// Relying party web app (Authorization Code + PKCE + signed request object)
    Web,
    /// Machine client: obtain a token with Client Credentials and call the API
    M2m,
}

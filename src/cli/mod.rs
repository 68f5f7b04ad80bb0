pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jobly")]
#[command(about = "Jobly API - companies and job postings backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Create the companies and jobs tables if missing")]
    Migrate,

    #[command(about = "Print a signed bearer token for local development")]
    Token {
        #[arg(help = "Username to embed in the token")]
        username: String,
        #[arg(long, help = "Mark the token holder as an administrator")]
        admin: bool,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::Migrate => commands::migrate::handle().await,
        Commands::Token { username, admin } => commands::token::handle(username, admin),
    }
}

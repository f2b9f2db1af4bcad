// MIST Gateway - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and MCP stdio server.
// Usage:
//   mist-gateway serve                        # Run MCP server (stdio)
//   mist-gateway tools                        # List enabled tools
//   mist-gateway call <tool> <json-args>      # Run one tool
//   mist-gateway read <uri>                   # Read one resource
//   mist-gateway status                       # Show effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mist_gateway::{config::MistConfig, mcp, paths, tools::Gateway};
use std::path::PathBuf;

fn default_config_path() -> PathBuf {
    paths::app_root().join("mist.json")
}

#[derive(Parser)]
#[command(name = "mist-gateway")]
#[command(author = "Joseph Stone")]
#[command(version)]
#[command(about = "MIST Gateway - MCP server for notes, mail, calendar, tasks, git and Notion")]
struct Cli {
    /// JSON config file. Missing file means defaults plus environment.
    #[arg(short, long, env = "MIST_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC)
    Serve,

    /// List enabled tools
    Tools,

    /// Run one tool and print its result
    Call {
        /// Tool name (add_note, search_emails, git_status, ...)
        tool: String,

        /// Arguments as JSON object
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Read one resource (gmail://, calendar://, tasks://)
    Read {
        uri: String,
    },

    /// Show effective configuration
    Status,
}

fn main() -> Result<()> {
    // .env first so its values feed config and logging
    dotenv::dotenv().ok();

    // Initialize logging (stderr; stdout is reserved for JSON-RPC)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let cli = Cli::parse();

    let config = MistConfig::load(Some(cli.config.as_path()))
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    match &cli.command {
        Commands::Serve => {
            mcp::run(Gateway::new(config)).context("MCP server failed")?;
        }

        Commands::Tools => {
            let gateway = Gateway::new(config);
            for tool in gateway.tool_definitions() {
                println!(
                    "{:<28} {}",
                    tool["name"].as_str().unwrap_or(""),
                    tool["description"].as_str().unwrap_or("")
                );
            }
        }

        Commands::Call { tool, args } => {
            let args: serde_json::Value = serde_json::from_str(args)
                .with_context(|| format!("Invalid args JSON: {}", args))?;

            let mut gateway = Gateway::new(config);
            let output = gateway.call(tool, &args);
            println!("{}", output.text);

            if output.is_error {
                std::process::exit(1);
            }
        }

        Commands::Read { uri } => {
            let mut gateway = Gateway::new(config);
            let text = gateway
                .read_resource(uri)
                .with_context(|| format!("Failed to read {}", uri))?;
            println!("{}", text);
        }

        Commands::Status => {
            println!("MIST Gateway v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {:?}", cli.config);
            println!();
            println!("{}", config.summary());
        }
    }

    Ok(())
}

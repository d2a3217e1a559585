//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`     Run a request (single message or interactive)
//! - `serve`   Start the HTTP front end
//! - `tools`   List the tool catalog
//! - `init`    Write the default config and workspace

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: a step-bounded tool-calling agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a request
    Run {
        /// Run a single request instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Replace the system prompt for this session
        #[arg(long)]
        system_prompt: Option<String>,

        /// Override the step budget
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Start the HTTP front end
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the tools offered to the agent
    Tools,

    /// Write the default config and workspace
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            message,
            system_prompt,
            max_steps,
        } => commands::run::run(message, system_prompt, max_steps).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Init => commands::init::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_shot_run() {
        let cli = Cli::try_parse_from([
            "stepwise", "run", "-m", "2+2", "--max-steps", "3", "--system-prompt", "be brief",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                message,
                system_prompt,
                max_steps,
            } => {
                assert_eq!(message.as_deref(), Some("2+2"));
                assert_eq!(system_prompt.as_deref(), Some("be brief"));
                assert_eq!(max_steps, Some(3));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["stepwise", "serve", "--port", "9000", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000) }));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["stepwise", "daemon"]).is_err());
    }
}

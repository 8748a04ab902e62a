mod commands;
mod context;
mod signer;
mod util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::agent::AgentCommands;
use commands::feedback::FeedbackCommands;
use commands::validation::ValidationCommands;
use context::{Context, GlobalArgs};

#[derive(Parser)]
#[command(
    name = "agentmarket",
    version,
    about = "Agent marketplace CLI: register agents, give feedback, and request validations"
)]
struct Cli {
    /// testnet, mainnet, devnet, localnet, or sandbox (in-process, persisted to --state-file)
    #[arg(long, global = true, env = "AGENTMARKET_NETWORK", default_value = "sandbox")]
    network: String,

    /// Sandbox state snapshot, shared between invocations
    #[arg(
        long,
        global = true,
        env = "AGENTMARKET_STATE_FILE",
        default_value = ".agentmarket/sandbox.json"
    )]
    state_file: PathBuf,

    /// Acting address (signer and default owner)
    #[arg(long, global = true, env = "AGENTMARKET_ADDRESS")]
    address: Option<String>,

    /// Approve every transaction without prompting
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "AGENTMARKET_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Agent identity operations
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Feedback operations
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
    /// Validation requests and responses
    Validation {
        #[command(subcommand)]
        command: ValidationCommands,
    },
    /// Feedback count, average score, and records for an agent
    Reputation {
        agent_id: u64,
        /// Only the on-chain summary, without the feedback list
        #[arg(long)]
        summary_only: bool,
    },
    /// Show the resolved deployment configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agentmarket_core=info,agentmarket=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let ctx = Context::from_args(GlobalArgs {
        network: cli.network,
        state_file: cli.state_file,
        address: cli.address,
        yes: cli.yes,
    });

    let code = match cli.command {
        Commands::Agent { command } => commands::agent::run(&ctx, command).await,
        Commands::Feedback { command } => commands::feedback::run(&ctx, command).await,
        Commands::Validation { command } => commands::validation::run(&ctx, command).await,
        Commands::Reputation {
            agent_id,
            summary_only,
        } => commands::feedback::reputation(&ctx, agent_id, summary_only).await,
        Commands::Config => commands::system::config(&ctx),
    };

    let persisted = ctx.persist();
    std::process::exit(if code == 0 { persisted } else { code });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_command_with_globals_anywhere() {
        let cli = Cli::try_parse_from([
            "agentmarket",
            "feedback",
            "give",
            "3",
            "--score",
            "85",
            "--network",
            "sandbox",
            "-y",
        ])
        .unwrap();
        assert!(cli.yes);
        assert!(matches!(
            cli.command,
            Commands::Feedback {
                command: FeedbackCommands::Give { agent_id: 3, score: 85, .. }
            }
        ));
    }
}

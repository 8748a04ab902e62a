use agentmarket_core::model::{AgentDraft, AgentMetadata, Endpoint};
use agentmarket_core::session::EditSession;
use agentmarket_core::{MarketError, ReadModel};
use clap::{Args, Subcommand};
use serde_json::json;

use crate::context::Context;
use crate::util::{exit_error, merge_object, print_market_error, read_json_from_file, read_object, report};

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Register a new agent (stores its metadata document, then registers it)
    Register(RegisterArgs),
    /// Show one agent by numeric id, with resolved metadata
    Show {
        agent_id: u64,
    },
    /// List agents held by an address, or every registered agent with --all
    List {
        /// Owner address (defaults to --address)
        #[arg(long, conflicts_with = "all")]
        owner: Option<String>,
        /// Discover all agents from registration events
        #[arg(long)]
        all: bool,
    },
    /// Change the on-chain description
    SetDescription {
        /// Agent object id
        #[arg(long)]
        agent: String,
        description: String,
    },
    /// Change the on-chain image URL
    SetImage {
        /// Agent object id
        #[arg(long)]
        agent: String,
        image: String,
    },
    /// Append a service endpoint
    AddEndpoint {
        /// Agent object id
        #[arg(long)]
        agent: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        endpoint: String,
        #[arg(long, default_value = "")]
        version: String,
    },
    /// Merge a JSON patch into the agent's metadata and store the result
    UpdateMetadata {
        /// Numeric agent id
        agent_id: u64,
        /// JSON object whose top-level keys replace the stored ones (null removes)
        #[arg(long, short = 'f')]
        file: String,
        /// Extra save attempts after a failed one
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long, required_unless_present = "file")]
    pub name: Option<String>,
    #[arg(long, required_unless_present = "file")]
    pub description: Option<String>,
    #[arg(long)]
    pub image: Option<String>,
    /// Endpoint as NAME=URL or NAME=URL@VERSION (repeatable)
    #[arg(long = "endpoint")]
    pub endpoints: Vec<String>,
    /// Full draft as JSON (use '-' for stdin). Flags override its fields.
    #[arg(long, short = 'f')]
    pub file: Option<String>,
}

pub async fn run(ctx: &Context, command: AgentCommands) -> i32 {
    match command {
        AgentCommands::Register(args) => register(ctx, args).await,
        AgentCommands::Show { agent_id } => report(ctx.reader().get_agent(agent_id).await),
        AgentCommands::List { owner, all } => {
            if all {
                report(ctx.reader().list_all_agents().await)
            } else {
                let owner = owner.unwrap_or_else(|| ctx.require_address().to_string());
                report(ctx.reader().list_owned_agents(&owner).await)
            }
        }
        AgentCommands::SetDescription { agent, description } => {
            let signer = ctx.signer();
            report(ctx.market.set_description(&agent, &description, &signer).await)
        }
        AgentCommands::SetImage { agent, image } => {
            let signer = ctx.signer();
            report(ctx.market.set_image(&agent, &image, &signer).await)
        }
        AgentCommands::AddEndpoint {
            agent,
            name,
            endpoint,
            version,
        } => {
            let signer = ctx.signer();
            let endpoint = Endpoint {
                name,
                endpoint,
                version,
                extensions: Default::default(),
            };
            report(ctx.market.add_endpoint(&agent, endpoint, &signer).await)
        }
        AgentCommands::UpdateMetadata {
            agent_id,
            file,
            retries,
        } => update_metadata(ctx, agent_id, &file, retries).await,
    }
}

async fn register(ctx: &Context, args: RegisterArgs) -> i32 {
    let mut draft = match args.file.as_deref() {
        Some(path) => {
            let value = read_json_from_file(path)
                .unwrap_or_else(|e| exit_error(&e, Some("Provide a JSON agent draft")));
            serde_json::from_value::<AgentDraft>(value).unwrap_or_else(|e| {
                exit_error(
                    &format!("Invalid agent draft: {e}"),
                    Some("A draft needs at least \"name\" and \"description\""),
                )
            })
        }
        None => AgentDraft::default(),
    };
    if let Some(name) = args.name {
        draft.name = name;
    }
    if let Some(description) = args.description {
        draft.description = description;
    }
    if let Some(image) = args.image {
        draft.image = image;
    }
    for raw in &args.endpoints {
        draft.endpoints.push(parse_endpoint(raw).unwrap_or_else(|e| {
            exit_error(&e, Some("Use --endpoint NAME=URL or NAME=URL@VERSION"))
        }));
    }

    let signer = ctx.signer();
    report(ctx.market.register_agent(&draft, &signer).await)
}

/// Load the current metadata, apply the patch inside an edit session, and
/// save through an anchored write, retrying failed saves with the same draft.
async fn update_metadata(ctx: &Context, agent_id: u64, file: &str, retries: u32) -> i32 {
    let patch = read_object(Some(file));
    let reader = ctx.reader();

    let agent = match reader.get_agent(agent_id).await {
        Ok(agent) => agent,
        Err(e) => return print_market_error(&e),
    };
    let current = match current_metadata(&reader, &agent.token_uri).await {
        Ok(metadata) => metadata,
        Err(e) => return print_market_error(&e),
    };

    let mut session = EditSession::new();
    let edited = session.begin(current).and_then(|()| {
        session.edit(|metadata| {
            let mut doc = serde_json::to_value(&*metadata).unwrap_or_else(|_| json!({}));
            merge_object(&mut doc, patch);
            match serde_json::from_value::<AgentMetadata>(doc) {
                Ok(merged) => *metadata = merged,
                Err(e) => exit_error(&format!("Patch produces invalid metadata: {e}"), None),
            }
        })
    });
    if let Err(e) = edited {
        exit_error(&e.to_string(), None);
    }

    let signer = ctx.signer();
    let mut attempt = 0;
    loop {
        let started = if attempt == 0 {
            session.start_save()
        } else {
            session.retry()
        };
        let draft = match started {
            Ok(draft) => draft.clone(),
            Err(e) => exit_error(&e.to_string(), None),
        };
        attempt += 1;

        match ctx.market.update_metadata(&agent.id, &draft, &signer).await {
            Ok(record) => {
                if let Err(e) = session.finish_saved() {
                    tracing::warn!(event = "edit_session_desync", error = %e);
                }
                return report(Ok::<_, MarketError>(record));
            }
            Err(err) => {
                tracing::warn!(
                    event = "metadata_save_failed",
                    agent_id,
                    attempt,
                    code = err.code(),
                    error = %err,
                    "Metadata save failed"
                );
                if let Err(e) = session.finish_failed(err.to_string()) {
                    tracing::warn!(event = "edit_session_desync", error = %e);
                }
                let retryable = !matches!(
                    err,
                    MarketError::InvalidPayload(_) | MarketError::SigningRejected { .. }
                );
                if !retryable || attempt > retries {
                    return print_market_error(&err);
                }
            }
        }
    }
}

/// Metadata behind `token_uri`, or an empty document when the agent has
/// none stored yet.
async fn current_metadata(reader: &ReadModel, token_uri: &str) -> Result<AgentMetadata, MarketError> {
    if agentmarket_core::uri::content_id(token_uri).is_none() {
        return Ok(AgentMetadata::default());
    }
    reader.resolve(token_uri).await
}

fn parse_endpoint(raw: &str) -> Result<Endpoint, String> {
    let (name, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid endpoint '{raw}': expected NAME=URL"))?;
    let (endpoint, version) = match rest.rsplit_once('@') {
        Some((url, version)) if !version.contains('/') => (url, version),
        _ => (rest, ""),
    };
    if name.trim().is_empty() || endpoint.trim().is_empty() {
        return Err(format!("Invalid endpoint '{raw}': name and URL are required"));
    }
    Ok(Endpoint {
        name: name.trim().to_string(),
        endpoint: endpoint.trim().to_string(),
        version: version.trim().to_string(),
        extensions: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_with_and_without_version() {
        let ep = parse_endpoint("A2A=https://bot.example/a2a@0.3").unwrap();
        assert_eq!(ep.name, "A2A");
        assert_eq!(ep.endpoint, "https://bot.example/a2a");
        assert_eq!(ep.version, "0.3");

        let ep = parse_endpoint("MCP=https://user@host.example/mcp").unwrap();
        assert_eq!(ep.endpoint, "https://user@host.example/mcp");
        assert_eq!(ep.version, "");

        assert!(parse_endpoint("no-equals").is_err());
        assert!(parse_endpoint("=https://x").is_err());
    }
}

use agentmarket_core::digest::ContentDigest;
use agentmarket_core::model::{
    ValidationRequestContent, ValidationResponseContent, ValidationStatus,
};
use agentmarket_core::read_model::ValidationFilter;
use clap::Subcommand;

use crate::context::Context;
use crate::util::{exit_error, read_object, report};

#[derive(Subcommand)]
pub enum ValidationCommands {
    /// Ask a validator to validate one of your agents
    Request {
        /// Agent object id (its numeric id is read from the ledger)
        #[arg(long)]
        agent: String,
        /// Address of the validator who may respond
        #[arg(long)]
        validator: String,
        #[arg(long)]
        description: Option<String>,
        /// Extra document fields as a JSON object (use '-' for stdin)
        #[arg(long, short = 'f')]
        file: Option<String>,
    },
    /// Respond to a request addressed to you (a later response replaces an earlier one)
    Respond {
        /// Request key (hex request digest)
        #[arg(long)]
        key: String,
        /// rejected, approved, or pending (or 0, 1, 2)
        #[arg(long)]
        status: String,
        #[arg(long, default_value = "")]
        tag: String,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long, short = 'f')]
        file: Option<String>,
    },
    /// List requests with their latest response
    List {
        #[arg(long)]
        agent_id: Option<u64>,
        #[arg(long)]
        validator: Option<String>,
    },
}

pub async fn run(ctx: &Context, command: ValidationCommands) -> i32 {
    match command {
        ValidationCommands::Request {
            agent,
            validator,
            description,
            file,
        } => {
            let content = ValidationRequestContent {
                agent_id: 0,
                validator: validator.clone(),
                description,
                created_at: Some(chrono::Utc::now()),
                extensions: read_object(file.as_deref()).into_iter().collect(),
            };
            let signer = ctx.signer();
            report(
                ctx.market
                    .request_validation(&agent, &validator, content, &signer)
                    .await,
            )
        }
        ValidationCommands::Respond {
            key,
            status,
            tag,
            comment,
            file,
        } => {
            let request_hash = ContentDigest::from_hex(&key).unwrap_or_else(|e| {
                exit_error(
                    &format!("Invalid request key: {e}"),
                    Some("Use the 64-character hex key from `validation list`"),
                )
            });
            let status: ValidationStatus = status
                .parse()
                .unwrap_or_else(|e: String| exit_error(&e, None));
            let content = ValidationResponseContent {
                request_hash,
                response: status,
                comment,
                created_at: Some(chrono::Utc::now()),
                extensions: read_object(file.as_deref()).into_iter().collect(),
            };
            let signer = ctx.signer();
            report(
                ctx.market
                    .respond_validation(request_hash, status, content, &tag, &signer)
                    .await,
            )
        }
        ValidationCommands::List {
            agent_id,
            validator,
        } => {
            let filter = ValidationFilter {
                agent_id,
                validator,
            };
            report(ctx.reader().list_validations(&filter).await)
        }
    }
}

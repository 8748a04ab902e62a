use agentmarket_core::model::FeedbackContent;
use clap::Subcommand;

use crate::context::Context;
use crate::util::{exit_error, read_object, report};

#[derive(Subcommand)]
pub enum FeedbackCommands {
    /// Submit feedback for an agent (stores the document, then records it)
    Give {
        agent_id: u64,
        /// Score from 0 to 100
        #[arg(long)]
        score: u8,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Extra document fields as a JSON object (use '-' for stdin)
        #[arg(long, short = 'f')]
        file: Option<String>,
    },
    /// List every feedback record for an agent
    List {
        agent_id: u64,
    },
    /// Fetch and decode the feedback document behind a walrus:// URI
    Show {
        uri: String,
    },
}

pub async fn run(ctx: &Context, command: FeedbackCommands) -> i32 {
    match command {
        FeedbackCommands::Give {
            agent_id,
            score,
            comment,
            tag,
            file,
        } => {
            let extensions = read_object(file.as_deref());
            let content = FeedbackContent {
                agent_id,
                score,
                tag,
                comment,
                created_at: Some(chrono::Utc::now()),
                extensions: extensions.into_iter().collect(),
            };
            let signer = ctx.signer();
            report(ctx.market.give_feedback(agent_id, score, content, &signer).await)
        }
        FeedbackCommands::List { agent_id } => report(ctx.reader().list_feedback(agent_id).await),
        FeedbackCommands::Show { uri } => {
            if agentmarket_core::uri::content_id(&uri).is_none() {
                exit_error(
                    &format!("'{uri}' is not a walrus:// URI"),
                    Some("Use the fileUri of a feedback record"),
                );
            }
            report(ctx.reader().resolve::<FeedbackContent>(&uri).await)
        }
    }
}

/// `agentmarket reputation <agent-id>`
pub async fn reputation(ctx: &Context, agent_id: u64, summary_only: bool) -> i32 {
    let reader = ctx.reader();
    let caller = ctx.address();
    let reputation = if summary_only {
        reader.resolve_reputation_summary(agent_id, caller).await
    } else {
        reader.resolve_reputation(agent_id, caller).await
    };
    crate::util::print_json(&reputation)
}

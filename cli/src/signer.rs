use std::io::{BufRead, Write};

use agentmarket_core::ledger::TransactionIntent;
use agentmarket_core::signer::{SignedTransaction, Signer, SignerError};
use async_trait::async_trait;

/// Asks on the terminal before every transaction. With `auto_approve` it
/// approves without asking.
pub struct PromptSigner {
    address: String,
    auto_approve: bool,
}

impl PromptSigner {
    pub fn new(address: String, auto_approve: bool) -> Self {
        Self {
            address,
            auto_approve,
        }
    }
}

#[async_trait]
impl Signer for PromptSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, intent: &TransactionIntent) -> Result<SignedTransaction, SignerError> {
        if !self.auto_approve {
            let summary = serde_json::to_string_pretty(intent)
                .map_err(|e| SignerError::Unavailable(e.to_string()))?;
            let prompt = format!(
                "Sign {} as {}?\n{summary}\n[y/N] ",
                intent.entry_point(),
                self.address
            );
            let approved = tokio::task::spawn_blocking(move || ask(&prompt))
                .await
                .map_err(|e| SignerError::Unavailable(e.to_string()))?
                .map_err(|e| SignerError::Unavailable(format!("cannot read terminal: {e}")))?;
            if !approved {
                return Err(SignerError::Rejected(format!(
                    "declined {}",
                    intent.entry_point()
                )));
            }
        }

        Ok(SignedTransaction {
            intent: intent.clone(),
            sender: self.address.clone(),
            signature: format!("cli:{}", uuid::Uuid::now_v7()),
        })
    }
}

fn ask(prompt: &str) -> std::io::Result<bool> {
    let mut stderr = std::io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

//! Bookkeeping between push sends and receipt reconciliation
use std::collections::{BTreeSet, HashMap};

use push_gateway::PushTicket;
use tokio::sync::Mutex;

#[derive(Default)]
struct LedgerState {
    // ticket id -> token the message was addressed to
    pending: HashMap<String, String>,
    invalid_tokens: BTreeSet<String>,
}

/// Tracks issued push tickets until their receipts are checked
#[derive(Default)]
pub struct ReceiptLedger {
    state: Mutex<LedgerState>,
}

impl ReceiptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the ticket returned for a message sent to `token`
    ///
    /// Accepted tickets wait for a receipt. Tickets rejected with
    /// `DeviceNotRegistered` mark the token invalid right away.
    pub async fn record(&self, token: &str, ticket: &PushTicket) {
        let mut state = self.state.lock().await;
        match ticket {
            PushTicket::Ok { id } => {
                state.pending.insert(id.clone(), token.to_string());
            }
            PushTicket::Error { .. } if ticket.is_device_not_registered() => {
                state.invalid_tokens.insert(token.to_string());
            }
            PushTicket::Error { message, .. } => {
                tracing::debug!(error = %message, "Push ticket rejected");
            }
        }
    }

    /// Take every ticket awaiting a receipt
    pub async fn drain(&self) -> HashMap<String, String> {
        std::mem::take(&mut self.state.lock().await.pending)
    }

    /// Put tickets back for the next reconciliation round
    pub async fn requeue(&self, tickets: HashMap<String, String>) {
        self.state.lock().await.pending.extend(tickets);
    }

    pub async fn mark_invalid(&self, token: &str) {
        self.state
            .lock()
            .await
            .invalid_tokens
            .insert(token.to_string());
    }

    /// Take every token known to be unregistered
    pub async fn take_invalid_tokens(&self) -> BTreeSet<String> {
        std::mem::take(&mut self.state.lock().await.invalid_tokens)
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

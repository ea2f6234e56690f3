//! Best-effort push delivery
//!
//! Delivery is at-most-once: a batch that fails to send is logged and
//! skipped, never retried.
use std::collections::BTreeSet;
use std::sync::Arc;

use push_gateway::{PushGateway, PushMessage, PushTicket};
use tokio::task::JoinHandle;

use super::receipts::ReceiptLedger;
use crate::metrics;

/// Outcome of one delivery call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    pub batches_sent: usize,
    pub batches_failed: usize,
    pub tickets: Vec<PushTicket>,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    gateway: Arc<dyn PushGateway>,
    ledger: Arc<ReceiptLedger>,
}

impl NotificationDispatcher {
    pub fn new(gateway: Arc<dyn PushGateway>, ledger: Arc<ReceiptLedger>) -> Self {
        Self { gateway, ledger }
    }

    pub fn ledger(&self) -> &Arc<ReceiptLedger> {
        &self.ledger
    }

    /// Fire-and-forget form of [`deliver`](Self::deliver)
    pub fn dispatch(
        &self,
        tokens: Vec<String>,
        title: String,
        body: String,
    ) -> JoinHandle<DeliveryReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.deliver(&tokens, &title, &body).await })
    }

    /// Send one notification to every token
    ///
    /// Tokens are de-duplicated and blanks dropped. Batches go out one after
    /// another; a failed batch does not stop the rest. Never returns an error.
    pub async fn deliver(&self, tokens: &[String], title: &str, body: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let mut seen = BTreeSet::new();
        let messages: Vec<PushMessage> = tokens
            .iter()
            .map(|token| token.trim())
            .filter(|token| !token.is_empty() && seen.insert(*token))
            .map(|token| PushMessage::new(token, title, body))
            .collect();

        if messages.is_empty() {
            return report;
        }

        for batch in self.gateway.chunk(messages) {
            match self.gateway.send_batch(&batch).await {
                Ok(tickets) => {
                    report.batches_sent += 1;
                    metrics::record_push_batch(true);

                    if tickets.len() != batch.len() {
                        tracing::warn!(
                            messages = batch.len(),
                            tickets = tickets.len(),
                            "Push gateway returned a mismatched ticket count"
                        );
                    }
                    for (message, ticket) in batch.iter().zip(tickets) {
                        metrics::record_push_ticket(match &ticket {
                            PushTicket::Ok { .. } => "ok",
                            PushTicket::Error { .. } => "error",
                        });
                        self.ledger.record(&message.to, &ticket).await;
                        report.tickets.push(ticket);
                    }
                }
                Err(e) => {
                    report.batches_failed += 1;
                    metrics::record_push_batch(false);
                    tracing::warn!(
                        error = %e,
                        batch_size = batch.len(),
                        "Failed to send push batch, continuing with the next one"
                    );
                }
            }
        }

        tracing::debug!(
            batches_sent = report.batches_sent,
            batches_failed = report.batches_failed,
            tickets = report.tickets.len(),
            "Push delivery finished"
        );

        report
    }
}

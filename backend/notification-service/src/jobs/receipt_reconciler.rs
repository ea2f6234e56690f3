//! Push Receipt Reconciliation Background Job
//!
//! Periodically looks up delivery receipts for issued push tickets and
//! removes device tokens the provider reports as `DeviceNotRegistered` from
//! every user. Failed lookups are retried on the next round. Failed pushes
//! are never re-sent.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use document_store::DocumentStore;
use push_gateway::PushGateway;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::ReceiptLedger;

/// Outcome of one reconciliation round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub requeued: usize,
    pub removed_tokens: usize,
}

pub struct ReceiptReconciler {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PushGateway>,
    ledger: Arc<ReceiptLedger>,
}

impl ReceiptReconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        ledger: Arc<ReceiptLedger>,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
        }
    }

    /// Run one reconciliation round
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut invalid: BTreeSet<String> = self.ledger.take_invalid_tokens().await;

        let pending = self.ledger.drain().await;
        if !pending.is_empty() {
            let ids: Vec<String> = pending.keys().cloned().collect();
            match self.gateway.fetch_receipts(&ids).await {
                Ok(receipts) => {
                    report.checked = receipts.len();
                    for (id, receipt) in &receipts {
                        if !receipt.is_device_not_registered() {
                            continue;
                        }
                        if let Some(token) = pending.get(id) {
                            invalid.insert(token.clone());
                        }
                    }
                    let missing = ids.len().saturating_sub(receipts.len());
                    if missing > 0 {
                        tracing::debug!(missing, "Push receipts not available, dropping tickets");
                    }
                }
                Err(e) => {
                    report.requeued = pending.len();
                    tracing::warn!(
                        error = %e,
                        tickets = pending.len(),
                        "Failed to fetch push receipts, retrying next round"
                    );
                    self.ledger.requeue(pending).await;
                }
            }
        }

        for token in invalid {
            match self.store.remove_push_token(&token).await {
                Ok(users) => {
                    report.removed_tokens += 1;
                    tracing::info!(users, "Removed unregistered push token");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to remove push token, retrying next round");
                    self.ledger.mark_invalid(&token).await;
                }
            }
        }

        report
    }
}

/// Handle to the running reconciliation loop
pub struct ReconcilerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signal the loop to stop and wait for the current round to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Receipt reconciler task failed");
        }
    }
}

/// Start the reconciliation loop on the runtime
pub fn spawn_receipt_reconciler(
    reconciler: Arc<ReceiptReconciler>,
    interval: Duration,
) -> ReconcilerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "Starting push receipt reconciler"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately and there is nothing to check yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = reconciler.reconcile().await;
                    tracing::debug!(
                        checked = report.checked,
                        requeued = report.requeued,
                        removed_tokens = report.removed_tokens,
                        "Push receipt round finished"
                    );
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Push receipt reconciler stopped");
    });

    ReconcilerHandle { shutdown_tx, task }
}

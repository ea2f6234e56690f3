/// Push Gateway Shared Library
///
/// Outbound mobile push delivery through the Expo push service.
///
/// It handles:
/// - Chunking messages into provider-sized batches
/// - Batch sends returning one ticket per message
/// - Receipt lookups for delivered tickets
/// - Push token shape validation

pub mod client;
pub mod errors;
pub mod models;

use std::collections::HashMap;

pub use client::{ExpoPushClient, MAX_MESSAGES_PER_BATCH, MAX_RECEIPT_IDS_PER_REQUEST};
pub use errors::{PushError, Result};
pub use models::{
    is_expo_push_token, PushErrorDetails, PushMessage, PushReceipt, PushTicket,
    DEVICE_NOT_REGISTERED,
};

/// Provider-facing push delivery contract.
///
/// `chunk` is pure; `send_batch` fails per batch, so callers can continue with
/// the remaining batches.
#[async_trait::async_trait]
pub trait PushGateway: Send + Sync {
    /// Split messages into ordered, provider-accepted batches
    fn chunk(&self, messages: Vec<PushMessage>) -> Vec<Vec<PushMessage>>;

    /// Send a single batch, returning one ticket per message in order
    async fn send_batch(&self, batch: &[PushMessage]) -> Result<Vec<PushTicket>>;

    /// Look up delivery receipts for previously issued ticket ids
    async fn fetch_receipts(&self, ticket_ids: &[String]) -> Result<HashMap<String, PushReceipt>>;
}

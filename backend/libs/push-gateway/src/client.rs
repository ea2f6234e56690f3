use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{PushError, Result};
use crate::models::*;
use crate::PushGateway;

/// Expo accepts at most this many messages per send request
pub const MAX_MESSAGES_PER_BATCH: usize = 100;

/// Expo accepts at most this many ids per receipt request
pub const MAX_RECEIPT_IDS_PER_REQUEST: usize = 1000;

const SEND_PATH: &str = "/--/api/v2/push/send";
const RECEIPTS_PATH: &str = "/--/api/v2/push/getReceipts";

/// Expo Push Service Client
///
/// Sends notifications to Expo push tokens and looks up delivery receipts.
/// An access token is only required when enhanced push security is enabled
/// on the Expo project.
pub struct ExpoPushClient {
    pub base_url: String,
    access_token: Option<String>,
    http_client: reqwest::Client,
}

impl ExpoPushClient {
    /// Create new Expo client
    ///
    /// # Arguments
    /// * `base_url` - Expo host, e.g. `https://exp.host`
    /// * `access_token` - Optional bearer token for the Expo project
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            http_client: reqwest::Client::new(),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PushError::Api(status.to_string(), error_text));
        }

        let envelope: ExpoResponse<T> = response
            .json()
            .await
            .map_err(|e| PushError::ResponseParse(e.to_string()))?;

        if let Some(error) = envelope.errors.into_iter().next() {
            return Err(PushError::Api(
                error.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                error.message.unwrap_or_default(),
            ));
        }

        envelope
            .data
            .ok_or_else(|| PushError::ResponseParse("response carried no data".to_string()))
    }
}

#[async_trait::async_trait]
impl PushGateway for ExpoPushClient {
    fn chunk(&self, messages: Vec<PushMessage>) -> Vec<Vec<PushMessage>> {
        messages
            .chunks(MAX_MESSAGES_PER_BATCH)
            .map(|c| c.to_vec())
            .collect()
    }

    async fn send_batch(&self, batch: &[PushMessage]) -> Result<Vec<PushTicket>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let tickets: Vec<PushTicket> = self.post(SEND_PATH, batch).await?;
        debug!(
            "Expo accepted batch of {} messages, {} tickets",
            batch.len(),
            tickets.len()
        );
        Ok(tickets)
    }

    async fn fetch_receipts(&self, ticket_ids: &[String]) -> Result<HashMap<String, PushReceipt>> {
        let mut receipts = HashMap::new();

        for ids in ticket_ids.chunks(MAX_RECEIPT_IDS_PER_REQUEST) {
            let page: HashMap<String, PushReceipt> =
                self.post(RECEIPTS_PATH, &ReceiptRequest { ids }).await?;
            receipts.extend(page);
        }

        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ExpoPushClient {
        ExpoPushClient::new("https://exp.host/", None)
    }

    #[test]
    fn test_client_trims_base_url() {
        assert_eq!(client().base_url, "https://exp.host");
    }

    #[test]
    fn test_chunk_respects_batch_limit() {
        let messages: Vec<PushMessage> = (0..250)
            .map(|i| PushMessage::new(format!("ExponentPushToken[{}]", i), "t", "b"))
            .collect();

        let batches = client().chunk(messages.clone());

        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
        assert_eq!(batches.concat(), messages);
    }

    #[test]
    fn test_chunk_empty() {
        assert!(client().chunk(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_send_empty_batch_skips_request() {
        let tickets = client().send_batch(&[]).await.unwrap();
        assert!(tickets.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_no_receipts_skips_request() {
        let receipts = client().fetch_receipts(&[]).await.unwrap();
        assert!(receipts.is_empty());
    }
}

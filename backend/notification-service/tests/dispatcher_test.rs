use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use document_store::{DocumentStore, InMemoryStore, User};
use mockall::mock;
use notification_service::jobs::ReceiptReconciler;
use notification_service::services::{NotificationDispatcher, ReceiptLedger};
use push_gateway::{
    PushError, PushErrorDetails, PushGateway, PushMessage, PushReceipt, PushTicket, Result,
    DEVICE_NOT_REGISTERED,
};
use uuid::Uuid;

mock! {
    pub Gateway {}

    #[async_trait::async_trait]
    impl PushGateway for Gateway {
        fn chunk(&self, messages: Vec<PushMessage>) -> Vec<Vec<PushMessage>>;
        async fn send_batch(&self, batch: &[PushMessage]) -> Result<Vec<PushTicket>>;
        async fn fetch_receipts(
            &self,
            ticket_ids: &[String],
        ) -> Result<HashMap<String, PushReceipt>>;
    }
}

fn tokens(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ExponentPushToken[{}]", i)).collect()
}

fn ok_tickets(batch: &[PushMessage]) -> Vec<PushTicket> {
    batch
        .iter()
        .map(|m| PushTicket::Ok {
            id: format!("ticket-{}", m.to),
        })
        .collect()
}

fn dispatcher(gateway: MockGateway) -> NotificationDispatcher {
    NotificationDispatcher::new(Arc::new(gateway), Arc::new(ReceiptLedger::new()))
}

#[tokio::test]
async fn test_empty_token_list_sends_nothing() {
    let mut gateway = MockGateway::new();
    gateway.expect_chunk().never();
    gateway.expect_send_batch().never();

    let report = dispatcher(gateway).deliver(&[], "title", "body").await;

    assert_eq!(report.batches_sent, 0);
    assert_eq!(report.batches_failed, 0);
    assert!(report.tickets.is_empty());
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_the_rest() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_chunk()
        .times(1)
        .returning(|messages| messages.chunks(100).map(|c| c.to_vec()).collect());

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    gateway.expect_send_batch().times(3).returning(move |batch| {
        if seen.fetch_add(1, Ordering::SeqCst) == 1 {
            Err(PushError::Api("503".to_string(), "unavailable".to_string()))
        } else {
            Ok(ok_tickets(batch))
        }
    });

    let report = dispatcher(gateway)
        .deliver(&tokens(250), "Picnic", "ana: hi")
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.batches_sent, 2);
    assert_eq!(report.batches_failed, 1);
    // 100 from the first batch, 50 from the last
    assert_eq!(report.tickets.len(), 150);
}

#[tokio::test]
async fn test_tokens_deduplicated_and_blanks_dropped() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_chunk()
        .withf(|messages| messages.len() == 2)
        .returning(|messages| vec![messages]);
    gateway
        .expect_send_batch()
        .times(1)
        .returning(|batch| Ok(ok_tickets(batch)));

    let input = vec![
        "ExponentPushToken[a]".to_string(),
        "ExponentPushToken[a]".to_string(),
        "  ".to_string(),
        String::new(),
        "ExponentPushToken[b]".to_string(),
    ];
    let report = dispatcher(gateway).deliver(&input, "t", "b").await;
    assert_eq!(report.tickets.len(), 2);
}

#[tokio::test]
async fn test_dispatch_is_fire_and_forget() {
    let mut gateway = MockGateway::new();
    gateway.expect_chunk().returning(|messages| vec![messages]);
    gateway
        .expect_send_batch()
        .returning(|_| Err(PushError::ResponseParse("garbage".to_string())));

    let handle = dispatcher(gateway).dispatch(tokens(3), "t".to_string(), "b".to_string());
    let report = handle.await.unwrap();
    assert_eq!(report.batches_failed, 1);
}

#[tokio::test]
async fn test_reconciler_removes_unregistered_tokens() {
    let store = Arc::new(InMemoryStore::new());
    let mut user = User::new(Uuid::new_v4(), "ana");
    user.tokens.insert("ExponentPushToken[gone]".to_string());
    user.tokens.insert("ExponentPushToken[live]".to_string());
    user.tokens.insert("ExponentPushToken[rejected]".to_string());
    store.insert_user(user.clone()).await.unwrap();

    let ledger = Arc::new(ReceiptLedger::new());
    ledger
        .record("ExponentPushToken[gone]", &PushTicket::Ok { id: "t-gone".to_string() })
        .await;
    ledger
        .record("ExponentPushToken[live]", &PushTicket::Ok { id: "t-live".to_string() })
        .await;
    ledger
        .record(
            "ExponentPushToken[rejected]",
            &PushTicket::Error {
                message: "not registered".to_string(),
                details: Some(PushErrorDetails {
                    error: Some(DEVICE_NOT_REGISTERED.to_string()),
                }),
            },
        )
        .await;

    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_receipts()
        .times(1)
        .returning(|_| {
            let mut receipts = HashMap::new();
            receipts.insert("t-live".to_string(), PushReceipt::Ok);
            receipts.insert(
                "t-gone".to_string(),
                PushReceipt::Error {
                    message: "gone".to_string(),
                    details: Some(PushErrorDetails {
                        error: Some(DEVICE_NOT_REGISTERED.to_string()),
                    }),
                },
            );
            Ok(receipts)
        });

    let reconciler = ReceiptReconciler::new(store.clone(), Arc::new(gateway), ledger.clone());
    let report = reconciler.reconcile().await;

    assert_eq!(report.checked, 2);
    assert_eq!(report.removed_tokens, 2);
    assert_eq!(ledger.pending_count().await, 0);

    let stored = store.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(
        stored.tokens.into_iter().collect::<Vec<_>>(),
        vec!["ExponentPushToken[live]".to_string()]
    );
}

#[tokio::test]
async fn test_reconciler_requeues_on_fetch_failure() {
    let store = Arc::new(InMemoryStore::new());
    let ledger = Arc::new(ReceiptLedger::new());
    ledger
        .record("ExponentPushToken[x]", &PushTicket::Ok { id: "t-x".to_string() })
        .await;

    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_receipts()
        .returning(|_| Err(PushError::Api("500".to_string(), "boom".to_string())));

    let reconciler = ReceiptReconciler::new(store, Arc::new(gateway), ledger.clone());
    let report = reconciler.reconcile().await;

    assert_eq!(report.requeued, 1);
    assert_eq!(ledger.pending_count().await, 1);
}

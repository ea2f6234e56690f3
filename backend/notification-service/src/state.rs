use std::sync::Arc;

use document_store::DocumentStore;
use push_gateway::PushGateway;

use crate::config::RealtimeConfig;
use crate::realtime::RealtimeHub;
use crate::services::{NotificationDispatcher, ReceiptLedger, SocialActivityService};

/// Long-lived application context
///
/// Built once at startup and shared by the HTTP handlers, the realtime
/// sessions and the receipt reconciler.
pub struct AppState {
    pub ledger: Arc<ReceiptLedger>,
    pub hub: RealtimeHub,
    pub activity: SocialActivityService,
    pub realtime: RealtimeConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        realtime: RealtimeConfig,
    ) -> Self {
        let ledger = Arc::new(ReceiptLedger::new());
        let hub = RealtimeHub::new();
        let dispatcher = NotificationDispatcher::new(gateway, ledger.clone());
        let activity = SocialActivityService::new(store, dispatcher, hub.clone());

        Self {
            ledger,
            hub,
            activity,
            realtime,
        }
    }
}

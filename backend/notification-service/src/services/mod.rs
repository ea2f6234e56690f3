pub mod activity;
pub mod dispatcher;
pub mod receipts;

pub use activity::{Rsvp, SocialActivityService};
pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use receipts::ReceiptLedger;

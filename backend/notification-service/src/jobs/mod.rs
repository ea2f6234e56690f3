pub mod receipt_reconciler;

pub use receipt_reconciler::{
    spawn_receipt_reconciler, ReceiptReconciler, ReconcileReport, ReconcilerHandle,
};

//! External service traits and in-memory implementations for saga steps.

pub mod alerts;
pub mod inventory;
pub mod notification;
pub mod orders;
pub mod payment;
pub mod receipt;

use std::sync::Arc;

pub use alerts::{AlertSink, InMemoryAlertSink, OperationalAlert, TracingAlertSink};
pub use inventory::{InMemoryInventoryService, InventoryService, ReservationResult};
pub use notification::{InMemoryNotificationService, NotificationService};
pub use orders::{InMemoryOrderService, OrderConfirmation, OrderService};
pub use payment::{
    ChargeRequest, ChargeResult, InMemoryPaymentGateway, PaymentGateway, PaymentRouter,
    RefundRequest, RefundResult,
};
pub use receipt::{InMemoryReceiptService, ReceiptService};

/// The collaborators a checkout saga talks to.
#[derive(Clone)]
pub struct CheckoutServices {
    pub inventory: Arc<dyn InventoryService>,
    pub payments: PaymentRouter,
    pub orders: Arc<dyn OrderService>,
    pub notifications: Arc<dyn NotificationService>,
    pub receipts: Arc<dyn ReceiptService>,
    pub alerts: Arc<dyn AlertSink>,
}

/// Handles to the in-memory collaborators behind [`CheckoutServices::in_memory`],
/// for toggling failures and inspecting calls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServices {
    pub inventory: InMemoryInventoryService,
    pub payments: InMemoryPaymentGateway,
    pub orders: InMemoryOrderService,
    pub notifications: InMemoryNotificationService,
    pub receipts: InMemoryReceiptService,
    pub alerts: InMemoryAlertSink,
}

impl CheckoutServices {
    /// Builds a service set backed entirely by in-memory implementations.
    ///
    /// One in-memory gateway serves every payment method.
    pub fn in_memory() -> (Self, InMemoryServices) {
        let handles = InMemoryServices::default();
        let services = Self {
            inventory: Arc::new(handles.inventory.clone()),
            payments: PaymentRouter::single(Arc::new(handles.payments.clone())),
            orders: Arc::new(handles.orders.clone()),
            notifications: Arc::new(handles.notifications.clone()),
            receipts: Arc::new(handles.receipts.clone()),
            alerts: Arc::new(handles.alerts.clone()),
        };
        (services, handles)
    }
}

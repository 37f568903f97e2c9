//! Checkout saga with compensating transactions.
//!
//! The checkout saga follows these steps:
//! 1. Validate consent and compute totals
//! 2. Create the transaction row
//! 3. Reserve inventory
//! 4. Charge payment through the gateway selected by payment method
//! 5. Persist the order and confirm
//!
//! If a step fails, the side effects recorded on the transaction are
//! reversed (refund, release), and the order is cancelled and the shopper
//! notified. Actions that exhaust their retries are picked up by the retry
//! sweep, which can run as a [`CompensationSweeper`] background task.

mod compensation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod request;
pub mod services;
pub mod steps;
pub mod sweeper;

pub use config::SagaConfig;
pub use coordinator::CheckoutSaga;
pub use error::{Result, SagaError};
pub use events::CheckoutEvent;
pub use request::{CheckoutOutcome, CheckoutRequest, CompensationReport, Consent, SweepReport};
pub use services::{
    AlertSink, CheckoutServices, InMemoryAlertSink, InMemoryInventoryService,
    InMemoryNotificationService, InMemoryOrderService, InMemoryPaymentGateway,
    InMemoryReceiptService, InMemoryServices, InventoryService, NotificationService,
    OperationalAlert, OrderService, PaymentGateway, PaymentRouter, ReceiptService,
    TracingAlertSink,
};
pub use sweeper::{CompensationSweeper, SweeperHandle};

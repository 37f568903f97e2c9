//! Checkout saga step and event names.

/// Step name: Create the transaction row.
pub const STEP_CREATE_TRANSACTION: &str = "create_transaction";

/// Step name: Reserve inventory for the order.
pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";

/// Step name: Charge the selected payment gateway.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: Persist the order reference and confirm.
pub const STEP_CONFIRM_ORDER: &str = "confirm_order";

/// Step name: Publish the order-created event.
pub const STEP_PUBLISH_ORDER_CREATED: &str = "publish_order_created";

/// Step name: Request receipt generation.
pub const STEP_REQUEST_RECEIPT: &str = "request_receipt";

/// Compensation step names, matching the compensation action types.
pub const STEP_REFUND_PAYMENT: &str = "refund_payment";
pub const STEP_RELEASE_INVENTORY: &str = "release_inventory";
pub const STEP_CANCEL_ORDER: &str = "cancel_order";
pub const STEP_NOTIFY: &str = "notify";

/// Notification event published once an order is confirmed.
pub const EVENT_ORDER_CREATED: &str = "checkout.order_created";

/// Notification event published by the `notify` compensation.
pub const EVENT_CHECKOUT_CANCELLED: &str = "checkout.cancelled";

/// Step name: Raise an operational alert.
pub const STEP_RAISE_ALERT: &str = "raise_alert";

//! Domain layer: payment identity, records, and canonical events.
//!
//! This module contains the server-side domain model: the internal
//! payment identifier, the payment record with its status state machine,
//! and the canonical webhook event the reconciliation engine consumes.

pub mod event;
pub mod payment;
pub mod payment_id;

pub use event::{EventKind, PaymentEvent};
pub use payment::{NewPayment, PaymentRecord, PaymentStatus};
pub use payment_id::PaymentId;

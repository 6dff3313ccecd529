//! Outbound integration with the payment gateway.
//!
//! [`client::PaymentGatewayClient`] talks to the REST API;
//! [`models`] defines the wire schema shared with webhook parsing.

pub mod client;
pub mod models;

pub use client::PaymentGatewayClient;
pub use models::{PaymentObject, PaymentStatusView};

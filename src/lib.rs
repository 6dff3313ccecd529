//! # kassa-gateway
//!
//! Webhook verification and reconciliation service for the YooKassa
//! payment gateway.
//!
//! Inbound webhook deliveries are authenticated with RSA-SHA256
//! signatures, decoded into payment events, and applied to the local
//! payment ledger at most once per gateway payment. Outbound payment
//! creation for balance top-ups goes through the same crate, so a host
//! application shares one payment model with the webhook side.
//!
//! ## Architecture
//!
//! ```text
//! YooKassa webhooks, host application calls
//!     │
//!     ├── Webhook Handler (api/)
//!     ├── TopupService (service/)
//!     │
//!     ├── SignatureVerifier + KeyStore (webhook/)
//!     ├── EventParser (webhook/)
//!     │
//!     ├── ReconciliationService (service/)
//!     ├── PaymentGatewayClient (gateway/)
//!     │
//!     └── PostgreSQL Persistence
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod persistence;
pub mod service;
pub mod webhook;

//! Inbound webhook processing.
//!
//! Three collaborating pieces: [`key_store::KeyStore`] fetches and
//! caches RSA verification keys, [`signature::SignatureVerifier`] checks
//! each delivery's signature header against them, and
//! [`parser::parse_event`] turns the raw body into a canonical
//! [`PaymentEvent`](crate::domain::PaymentEvent).

pub mod key_store;
pub mod parser;
pub mod signature;

pub use key_store::KeyStore;
pub use parser::{ParsedWebhook, parse_event};
pub use signature::{SignatureVerifier, Verification};

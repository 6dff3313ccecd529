//! Type-safe internal payment identifier.
//!
//! [`PaymentId`] is a newtype wrapper around [`uuid::Uuid`] (v4) providing
//! type safety so that internal payment identifiers cannot be confused
//! with the opaque gateway-issued payment id strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique internal identifier for a payment record.
///
/// Wraps a UUID v4. Generated once when the record is created and
/// immutable thereafter. Distinct from the gateway's own payment id,
/// which is an opaque string chosen by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(uuid::Uuid);

impl PaymentId {
    /// Creates a new random `PaymentId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `PaymentId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for PaymentId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PaymentId> for uuid::Uuid {
    fn from(id: PaymentId) -> Self {
        id.0
    }
}

//! HTTP endpoint handlers organized by concern.

pub mod system;
pub mod webhook;

//! Shared plumbing for Entrega services
//!
//! Everything here is service-agnostic: the API response envelope,
//! tracing initialization and the graceful-shutdown helper.

pub mod api;
pub mod logging;
pub mod shutdown;

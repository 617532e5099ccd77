//! Client-side SDK embedded in applications that invoke managed LLM-agent
//! services: wraps user invocation functions, enforces kill-switch and
//! guardrail-policy checks before any call is made, and emits a structured
//! telemetry event per invocation to a remote ingestion endpoint.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod client;
mod config;
mod error;
mod harvest;
mod policy_eval;
mod rate_tracker;
mod tool;
mod wrapper;

pub use client::InvokeLensClient;
pub use config::{resolve_region, SdkConfig, TransportModeConfig};
pub use error::InvokeError;
pub use rate_tracker::RateTracker;
pub use tool::ToolBuilder;
pub use wrapper::ObserveBuilder;

pub mod prelude {
    //! Common imports for applications embedding the SDK.
    pub use crate::{InvokeError, InvokeLensClient, SdkConfig, ToolBuilder};
    pub use invokelens_core::error::GuardrailError;
    pub use invokelens_core::span::TraceContext;
}

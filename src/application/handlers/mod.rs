//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations, plus the
//! batch jobs that reconcile legacy billing data.

pub mod gift;
pub mod migration;
pub mod pricing;
pub mod subscription;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

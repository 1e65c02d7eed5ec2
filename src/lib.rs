//! Membership Billing - subscription pricing and gift-code lifecycle.
//!
//! Composes shipping and membership line items for a book club, applies
//! role-preserving changes to live subscriptions, issues and redeems gift
//! codes, and reconciles pre-redesign billing data into the same model.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

//! Turnstile - Fixed-Window Quota Service
//!
//! This crate decides whether a request against a data source, optionally on
//! behalf of a user, would exceed any of four independent quotas (per user and
//! per data source, hourly and daily). Admitted requests are recorded against
//! every applicable quota in one atomic counter store transaction.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;

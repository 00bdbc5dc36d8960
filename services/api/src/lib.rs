//! services/api/src/lib.rs
//!
//! The HTTP service around `bank_core`: PostgreSQL and Redis adapters, the
//! axum router, and configuration.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

//! services/api/src/lib.rs
//!
//! HTTP service for the course marketplace: adapters for Postgres, the
//! in-memory store and Stripe, plus the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

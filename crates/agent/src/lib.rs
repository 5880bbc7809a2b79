//! Netpulse agent
//!
//! Configuration loading and the health/metrics HTTP surface shared by the
//! `collect` and `analyze` roles.

pub mod api;
pub mod config;

//! # ringfact
//!
//! The network-facing half of ringfact: HTTP API, CLI, configuration and the
//! gateway client for the dual-verification object store. All computation is
//! delegated to `ringfact-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod gateway;

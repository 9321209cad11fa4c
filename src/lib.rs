//! VPC ENI plugin - attaches containers to an elastic network interface
//!
//! This library provides the orchestration behind the plugin binary: it finds
//! or creates the virtual network bound to an ENI, attaches each container's
//! endpoint to it, and unwinds partial state when a step fails.

pub mod config;
pub mod error;
pub mod host;
pub mod network;
pub mod plugin;

pub use error::AppError;

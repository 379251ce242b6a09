//! kubedoctor - Kubernetes request-path, service and cluster diagnosis exposed as tools

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod diagnose;
pub mod error;
pub mod mermaid;
pub mod output;
pub mod server;
pub mod tools;

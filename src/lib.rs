//! vaultctl - operations console for the CodeVault platform

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod gateway;
pub mod model;
pub mod reconciler;
pub mod session;

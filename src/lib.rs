//! Lifecycle hooks that keep a MySQL node's raft role, read-only state and
//! pod labels consistent.

pub mod agent;
pub mod config;
pub mod health;
pub mod hooks;
pub mod metadata;
pub mod probe;
pub mod resolver;
pub mod role;

pub mod auth;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod policy;
pub mod protocol;
pub mod reaper;
pub mod service;
pub mod session;
pub mod store;
pub mod wal;
pub mod wire;

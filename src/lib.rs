// Kagami image transformation service library

pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod image_optimizer;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod storage;

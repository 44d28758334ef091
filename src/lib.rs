pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod execution;
pub mod feed;
pub mod kalshi;
pub mod pipeline;

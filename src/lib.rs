pub mod app;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod origin;
pub mod prefetch;
pub mod singleflight;
pub mod state;
pub mod tabs;
pub mod utils;
pub mod web;

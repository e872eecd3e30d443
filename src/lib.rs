//! Prometheus exporter for memcached server statistics.

pub mod catalog;
pub mod client;
pub mod collector;
pub mod config;
pub mod export;
pub mod sink;
pub mod stats;
pub mod translate;

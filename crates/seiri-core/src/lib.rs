pub mod aggregator;
pub mod config;
pub mod container;
pub mod error;
pub mod fetcher;
pub mod hydrator;
pub mod limiter;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod scan_log;
pub mod scanner;
pub mod sources;
pub mod storage;

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pricing;
pub mod storage;
pub mod telemetry;

//! Classification, filtering and aggregation engine for exported equipment
//! alarm records.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod drilldown;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod models;
pub mod report;
pub mod session;
pub mod weeks;

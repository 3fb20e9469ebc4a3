//! Pipeline conversions module
//!
//! This module contains the orchestration boundary between the host and the
//! stream files handed to the filter process.

mod exchange;

pub use exchange::ExchangePipeline;

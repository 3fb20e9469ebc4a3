//! Common utilities module
//!
//! This module contains the error taxonomy and the checked size arithmetic
//! shared across the exchange pipeline.

pub mod error;
pub mod size;

pub use error::{HostStatus, Result, TranscodeError};

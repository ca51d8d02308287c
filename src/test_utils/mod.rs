//! Test utilities for use case and route tests.
//!
//! This module provides:
//! - Test data factories with sensible defaults
//! - In-memory implementations of the store and catalog ports
//! - A manually driven clock
//! - A log capture buffer
//! - An `AppState` builder for route tests

mod app_state_builder;
mod clock;
mod factories;
mod subscription_mocks;

pub use app_state_builder::*;
pub use clock::*;
pub use factories::*;
pub use logs::*;
pub use subscription_mocks::*;

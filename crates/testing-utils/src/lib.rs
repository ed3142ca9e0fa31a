//! # Relay Testing Utils
//!
//! Shared testing utilities for the relay workspace.
//!
//! ## Features
//!
//! - **Scripted Backends**: backends that replay a fixed sequence of successes,
//!   failures, errors, panics and hangs while counting every call
//! - **Event Sink Doubles**: sinks that fail on demand or refuse concurrency
//! - **Test Data Builders**: tasks, plans and pre-populated registries
//! - **Event Assertions**: helpers for checking recorded event sequences
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! relay-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;

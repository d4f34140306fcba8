//! Core logger integration tests
//!
//! Filtering, stream isolation, rotation boundaries and lifecycle.

mod concurrency;
mod filtering;
mod rotation;

//! HTTP middleware integration tests
//!
//! Access records, handler errors and the demo server routes.

mod access;
mod server;

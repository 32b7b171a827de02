//! Stack integration tests
//!
//! Run with: cargo test --test stack

mod common;

mod bootstrap;
mod filtering;
mod forwarding;

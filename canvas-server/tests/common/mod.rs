//! Shared integration test helpers.

pub mod server;

#[allow(unused_imports)]
pub use server::*;

//! Integration test common infrastructure.
//!
//! Provides an in-process test server bound to an ephemeral port and a raw
//! line-based client for asserting on IRC message flows.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::{OPER_PASSWORD, TestServer};

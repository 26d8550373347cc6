//! lanternd - an IRC daemon built around a shared channel directory and
//! hot-pluggable command modules.
//!
//! The binary in `main.rs` is a thin wrapper: it loads [`config::Config`],
//! builds a [`state::Server`] and runs a [`network::Gateway`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod network;
pub mod security;
pub mod state;

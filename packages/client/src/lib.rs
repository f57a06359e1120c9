//! Castline client library.
//!
//! Session handling (token pair, single-flight refresh), the authenticated
//! HTTP request pipeline and the live chat client, plus the terminal client
//! built on top of them.

// core
pub mod chat;
pub mod http;
pub mod session;

// shared
pub mod config;
pub mod error;

// terminal client
pub mod cli;

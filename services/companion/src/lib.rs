//! Companion Service Library Crate
//!
//! Configuration and startup wiring for the companion MCP server. The
//! `companion` binary is a thin wrapper around this library.

pub mod config;
pub mod startup;

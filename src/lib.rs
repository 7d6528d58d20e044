//! Skill Graph MCP Server Library
//!
//! This module exports the core components for testing and integration.

pub mod activity;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod levels;
pub mod logging;
pub mod source;
pub mod timefmt;
pub mod tools;
pub mod types;

//! querydesk - asynchronous query execution behind an agent action.
//!
//! Submits SQL to a query engine, polls the execution to completion and
//! serves the result through an action-invocation envelope. This library
//! exposes the core modules for use in integration tests.

pub mod action;
pub mod agent;
pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod prompts;
pub mod proxy;
pub mod transcript;

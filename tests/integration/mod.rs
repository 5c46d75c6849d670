//! Integration tests for querydesk.

pub mod action_test;
pub mod chat_test;
pub mod local_engine_test;
pub mod proxy_test;

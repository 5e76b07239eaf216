//! Integration tests for preorder-bot.
//!
//! These tests verify the interaction between components:
//! - WebSocket connection lifecycle and subscriptions
//! - Trade ingest through aggregation to order placement
//! - Startup checks and quote bootstrap

pub mod common;

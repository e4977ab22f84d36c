//! chanrelay - chat channel ingestion relay.
//!
//! Listens to a chat platform account's update stream, turns channel
//! messages into normalized events and delivers them to an event intake
//! API, one cached writer per destination. A reconciliation loop keeps
//! the account's joined chats in line with the persisted channel registry.

pub mod api;
pub mod config;
pub mod convert;
pub mod db;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod platform;
pub mod services;
pub mod sink;
pub mod state;
pub mod tags;
pub mod telemetry;

#[cfg(test)]
mod testing;

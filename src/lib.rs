//! Pushgate - Real-time push gateway
//!
//! Maintains live WebSocket channels to browser and mobile clients and
//! fans out server-originated events (notifications, chat messages,
//! advisory record locks, typing indicators, presence counters)
//! without client polling. Delivery is strictly best-effort: entities
//! are durably persisted by caller modules before they reach this
//! crate.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;

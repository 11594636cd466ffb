//! Ports - Interfaces between the gateway and its collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the push gateway and the outside world. Adapters implement them.
//!
//! ## Inbound (implemented here, consumed by caller modules)
//!
//! - `RealtimeNotifier` - best-effort notification push
//! - `RealtimeMessenger` - best-effort chat and typing push
//!
//! ## Outbound (consumed here, implemented by adapters)
//!
//! - `TokenVerifier` - bearer-token verification at upgrade time

mod realtime;
mod token_verifier;

pub use realtime::{DeliveryError, RealtimeMessenger, RealtimeNotifier};
pub use token_verifier::TokenVerifier;

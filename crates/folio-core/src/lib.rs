//! folio/crates/folio-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the portfolio server:
//! the domain gate, access tokens, the live stream relay and notifications.

pub mod error;
pub mod gate;
pub mod models;
pub mod notification;
pub mod relay;
pub mod token;
pub mod traits;
pub mod tweets;
pub mod viewers;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

pub use gate::{normalize, Decision, DomainGate, GateOutcome};
pub use notification::{LogNotifier, Notification, NotificationKind};
pub use relay::{LiveRelay, RelayCommand, RelayConfig, RelayHandle, RelayState};
pub use token::AccessTokens;
pub use tweets::TweetNormalizer;
pub use viewers::{ViewerFrame, ViewerHandle, ViewerId, ViewerRegistry};

// opsdeck-api: async client core for the OpsDeck admin console backend.
//
// The heart of the crate is the request lifecycle in `client`: every
// outbound call gets credential injection, duplicate suppression,
// loading aggregation, error normalization, and exactly-once session
// teardown on authentication failure.

pub mod client;
pub mod error;
pub mod inflight;
pub mod loading;
pub mod models;
pub mod session;
pub mod transport;

mod auth;
mod health;
mod users;

pub use client::{Client, ClientContext, HeadlessNavigator, Navigator};
pub use error::{ApiError, Error};
pub use session::{Account, Credential, MemoryVault, Session, SessionStore, SessionVault};
pub use transport::TransportConfig;

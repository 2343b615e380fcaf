//! # pptime-remote
//!
//! Client for the remote time-tracking service.
//!
//! - [`ProjectPlaceClient`]: OAuth 1.0a signed access to the project,
//!   member and time-report listings, implementing `TimeSource`
//! - [`authorize`]: the three-legged flow producing an access token
//! - [`SnapshotSource`]: the same listings replayed from a JSON file
//!
//! ## Example
//!
//! ```rust,ignore
//! use pptime_core::TimeSource;
//! use pptime_remote::ProjectPlaceClient;
//!
//! let client = ProjectPlaceClient::connect(&config.service)?;
//! let projects = client.projects()?;
//! ```

pub mod authorize;
pub mod client;
pub mod payload;
pub mod signing;
pub mod snapshot;

pub use authorize::{authorize, OAuthFlow, TokenPair, VerifierSource};
pub use client::ProjectPlaceClient;
pub use signing::OAuthSigner;
pub use snapshot::SnapshotSource;

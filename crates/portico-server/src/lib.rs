//! # portico-server
//!
//! The flow orchestrator of the Portico identity provider: the endpoint set
//! (`/auth`, `/auth/{connector}`, `/callback`, `/approval`, `/token`, plus
//! discovery, JWKS, and health), the connector registry, ID-token minting,
//! and the background garbage collector.

#![forbid(unsafe_code)]

pub mod config;
pub mod endpoints;
pub mod gc;
pub mod keys;
pub mod pages;
pub mod password;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use router::create_router;
pub use state::{AppState, RegisteredConnector};

//! Client-side session and data-access layer for replay-management
//! services.
//!
//! The crate keeps an authenticated session against a remote replay API,
//! transparently renews expired credentials (one refresh-and-retry cycle
//! per request, single-flight across concurrent requests), and exposes the
//! remote collections — replays and dashboard statistics — as observable
//! client state with pagination and filtering.
//!
//! Everything hangs off a shared [`Session`] context injected into the
//! [`ApiClient`] transport and the stores:
//!
//! ```no_run
//! use std::sync::Arc;
//! use replaykit_core::{storage::MemoryStore, ApiClient, ReplayStore, Session, SessionManager};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! let session = Arc::new(Session::new(store));
//! let api = Arc::new(ApiClient::new("https://replay.example.com", Arc::clone(&session)));
//!
//! let auth = SessionManager::new(Arc::clone(&api));
//! if auth.login("alice", "hunter2").await {
//!     let replays = ReplayStore::new(api);
//!     replays.fetch().await;
//! }
//! # }
//! ```

mod auth;
pub use auth::*;

mod client;
pub use client::ApiClient;

mod error;
pub use error::ReplayKitError;

mod replays;
pub use replays::*;

mod session;
pub use session::*;

mod stats;
pub use stats::*;

pub mod storage;

mod types;
pub use types::*;

// private modules
mod http_request;

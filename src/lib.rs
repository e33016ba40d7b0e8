//! Client for the Rocket League Stats API.
//!
//! Calls are turned into [`Request`]s and queued on a per-client
//! [`Dispatcher`], which sends them in submission order under a rolling-window
//! rate limit and resolves one [`ResultHandle`] per request. Callers without
//! an async runtime can use [`BlockingClient`] instead.
//!
//! ```no_run
//! use rlstats::{Config, Platform, RlStatsClient, StatsApi};
//!
//! # async fn run() -> Result<(), rlstats::Error> {
//! let client = RlStatsClient::new(Config::new("my-api-key"))?;
//! let player = client.player("76561198033338223", Platform::Steam).await?;
//! println!("{} has {} goals", player.display_name, player.stats.goals);
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api_client;
pub mod blocking;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod gate;
pub mod handle;
pub mod request;
pub mod transport;
pub mod types;

pub use api_client::RlStatsClient;
pub use blocking::BlockingClient;
pub use client::{StatsApi, MAX_BATCH_PLAYERS};
pub use config::Config;
pub use dispatcher::{DispatchConfig, Dispatcher, Lifecycle};
pub use error::{ApiError, Error};
pub use executor::Executor;
pub use gate::{Admission, RateGate, RateLimit};
pub use handle::{HandleState, Outcome, ResultHandle};
pub use request::{Method, Request};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use types::*;

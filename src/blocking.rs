//! Blocking facade over [`RlStatsClient`] for callers without an async runtime.
//!
//! The client owns a small Tokio runtime that hosts its dispatcher. Every
//! call blocks the calling thread until the request is terminal, so none of
//! these methods may be used from inside an async task.
//!
//! ```no_run
//! use rlstats::blocking::BlockingClient;
//! use rlstats::{Config, Platform};
//!
//! # fn run() -> Result<(), rlstats::Error> {
//! let client = BlockingClient::new(Config::new("my-api-key"))?;
//! let player = client.player("76561198033338223", Platform::Steam)?;
//! println!("{} has {} wins", player.display_name, player.stats.wins);
//!
//! // raw submissions hand back a handle to wait on
//! let request = client.inner().request(rlstats::Method::Get, "/data/seasons");
//! let seasons = client.submit(request)?.wait()?;
//! println!("{seasons}");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{self, Runtime};

use crate::api_client::RlStatsClient;
use crate::client::StatsApi;
use crate::config::Config;
use crate::error::{ApiError, Error};
use crate::handle::ResultHandle;
use crate::request::Request;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::*;

pub struct BlockingClient {
    client: RlStatsClient,
    runtime: Runtime,
}

impl BlockingClient {
    pub fn new(config: Config) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    // requires RLSTATS_API_KEY env var
    pub fn from_env() -> Result<Self, Error> {
        Self::new(Config::from_env()?)
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("rlstats-dispatch")
            .enable_all()
            .build()?;
        let client = {
            let _guard = runtime.enter();
            RlStatsClient::with_transport(config, transport)?
        };
        Ok(Self { client, runtime })
    }

    /// The async client underneath, for building raw requests.
    pub fn inner(&self) -> &RlStatsClient {
        &self.client
    }

    /// Queues a raw request. Use [`ResultHandle::wait`] or
    /// [`ResultHandle::wait_timeout`] on the handle.
    pub fn submit(&self, request: Request) -> Result<ResultHandle, ApiError> {
        self.client.submit(request)
    }

    pub fn shutdown(&self) {
        self.block_on(self.client.shutdown())
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn platforms(&self) -> Result<Vec<PlatformInfo>, Error> {
        self.block_on(self.client.platforms())
    }

    pub fn tiers(&self, season: Option<u32>) -> Result<Vec<Tier>, Error> {
        self.block_on(self.client.tiers(season))
    }

    pub fn seasons(&self) -> Result<Vec<Season>, Error> {
        self.block_on(self.client.seasons())
    }

    pub fn playlists(&self) -> Result<Vec<Playlist>, Error> {
        self.block_on(self.client.playlists())
    }

    pub fn player(&self, unique_id: &str, platform: Platform) -> Result<Player, Error> {
        self.block_on(self.client.player(unique_id, platform))
    }

    pub fn players(&self, requests: &[PlayerRequest]) -> Result<Vec<Player>, Error> {
        self.block_on(self.client.players(requests))
    }

    pub fn search_players(&self, display_name: &str, page: u32) -> Result<SearchResultPage, Error> {
        self.block_on(self.client.search_players(display_name, page))
    }

    pub fn ranked_leaderboard(&self, playlist_id: u32) -> Result<Vec<Player>, Error> {
        self.block_on(self.client.ranked_leaderboard(playlist_id))
    }

    pub fn stat_leaderboard(&self, stat: Stat) -> Result<Vec<Player>, Error> {
        self.block_on(self.client.stat_leaderboard(stat))
    }
}

impl Drop for BlockingClient {
    fn drop(&mut self) {
        // cancels whatever is still queued and gives in-flight calls their
        // drain window before the runtime goes away
        self.runtime.block_on(self.client.shutdown());
    }
}

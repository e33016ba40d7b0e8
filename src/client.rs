use async_trait::async_trait;

use crate::error::Error;
use crate::types::{
    PlatformInfo, Platform, Player, PlayerRequest, Playlist, SearchResultPage, Season, Stat, Tier,
};

/// Most players a single batch lookup may ask for.
pub const MAX_BATCH_PLAYERS: usize = 10;

#[async_trait]
pub trait StatsApi {
    async fn platforms(&self) -> Result<Vec<PlatformInfo>, Error>;

    /// Tiers of the current season, or of `season` if given.
    async fn tiers(&self, season: Option<u32>) -> Result<Vec<Tier>, Error>;

    async fn seasons(&self) -> Result<Vec<Season>, Error>;

    async fn playlists(&self) -> Result<Vec<Playlist>, Error>;

    async fn player(&self, unique_id: &str, platform: Platform) -> Result<Player, Error>;

    /// Batch lookup of up to [`MAX_BATCH_PLAYERS`] players in one request.
    async fn players(&self, requests: &[PlayerRequest]) -> Result<Vec<Player>, Error>;

    async fn search_players(&self, display_name: &str, page: u32)
        -> Result<SearchResultPage, Error>;

    async fn ranked_leaderboard(&self, playlist_id: u32) -> Result<Vec<Player>, Error>;

    async fn stat_leaderboard(&self, stat: Stat) -> Result<Vec<Player>, Error>;
}

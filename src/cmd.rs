use std::future::Future;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};

use rlstats::{Error, Player, PlayerRequest, Platform, RlStatsClient, Stat, StatsApi};

#[derive(Parser, Debug)]
#[command(name = "rlstats", about = "Query the Rocket League Stats API")]
pub enum Cmd {
    /// List supported platforms
    Platforms,
    /// List ranked tiers
    Tiers {
        #[arg(long)]
        season: Option<u32>,
    },
    /// List competitive seasons
    Seasons,
    /// List playlists and their population
    Playlists,
    /// Look up one player
    Player {
        id: String,
        #[arg(long, default_value = "steam")]
        platform: Platform,
    },
    /// Look up up to 10 players at once, given as platform:id
    Players {
        #[arg(required = true)]
        players: Vec<PlayerRequest>,
    },
    /// Search players by display name
    Search {
        name: String,
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Top players of a ranked playlist
    Ranked { playlist: u32 },
    /// Top players by a lifetime stat
    Stat { stat: Stat },
}

fn retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(20).map(jitter).take(3)
}

fn is_transient(e: &Error) -> bool {
    matches!(e, Error::Api(api) if api.is_transient())
}

// every attempt is a fresh request through the dispatcher, so retries are
// rate limited like everything else
async fn with_retry<T, F, Fut>(action: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    RetryIf::spawn(retry_strategy(), action, is_transient).await
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn stat_value(player: &Player, stat: Stat) -> u64 {
    match stat {
        Stat::Wins => player.stats.wins,
        Stat::Goals => player.stats.goals,
        Stat::Mvps => player.stats.mvps,
        Stat::Saves => player.stats.saves,
        Stat::Shots => player.stats.shots,
        Stat::Assists => player.stats.assists,
    }
}

fn stat_leaderboard(players: &[Player], stat: Stat) {
    println!("# | {} | Player Name", stat.query_name());
    for (rank, player) in players.iter().enumerate() {
        println!(
            " {} | {} | {}",
            rank + 1,
            stat_value(player, stat),
            player.display_name
        );
    }
}

fn ranked_leaderboard(players: &[Player]) {
    println!("# | Platform | Player Name");
    for (rank, player) in players.iter().enumerate() {
        println!(
            " {} | {} | {}",
            rank + 1,
            player.platform.name,
            player.display_name
        );
    }
}

impl Cmd {
    pub async fn run(self) -> anyhow::Result<()> {
        let client = RlStatsClient::from_env()?;
        let result = self.dispatch(&client).await;
        client.shutdown().await;
        result
    }

    async fn dispatch(self, client: &RlStatsClient) -> anyhow::Result<()> {
        match self {
            Cmd::Platforms => print_json(&with_retry(|| client.platforms()).await?)?,
            Cmd::Tiers { season } => print_json(&with_retry(|| client.tiers(season)).await?)?,
            Cmd::Seasons => print_json(&with_retry(|| client.seasons()).await?)?,
            Cmd::Playlists => print_json(&with_retry(|| client.playlists()).await?)?,
            Cmd::Player { id, platform } => {
                print_json(&with_retry(|| client.player(&id, platform)).await?)?
            }
            Cmd::Players { players } => {
                print_json(&with_retry(|| client.players(&players)).await?)?
            }
            Cmd::Search { name, page } => {
                print_json(&with_retry(|| client.search_players(&name, page)).await?)?
            }
            Cmd::Ranked { playlist } => {
                let players = with_retry(|| client.ranked_leaderboard(playlist)).await?;
                ranked_leaderboard(&players);
            }
            Cmd::Stat { stat } => {
                let players = with_retry(|| client.stat_leaderboard(stat)).await?;
                stat_leaderboard(&players, stat);
            }
        }

        Ok(())
    }
}

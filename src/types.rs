use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Steam,
    Ps4,
    XboxOne,
}

impl Platform {
    pub fn id(self) -> u32 {
        match self {
            Platform::Steam => 1,
            Platform::Ps4 => 2,
            Platform::XboxOne => 3,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Platform::Steam),
            2 => Some(Platform::Ps4),
            3 => Some(Platform::XboxOne),
            _ => None,
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "steam" | "pc" | "1" => Ok(Platform::Steam),
            "ps4" | "psn" | "2" => Ok(Platform::Ps4),
            "xbox" | "xboxone" | "xbl" | "3" => Ok(Platform::XboxOne),
            other => Err(format!("unknown platform {other:?}")),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Steam => write!(f, "Steam"),
            Platform::Ps4 => write!(f, "Ps4"),
            Platform::XboxOne => write!(f, "XboxOne"),
        }
    }
}

/// Stats a leaderboard can be ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stat {
    Wins,
    Goals,
    Mvps,
    Saves,
    Shots,
    Assists,
}

impl Stat {
    pub fn query_name(self) -> &'static str {
        match self {
            Stat::Wins => "wins",
            Stat::Goals => "goals",
            Stat::Mvps => "mvps",
            Stat::Saves => "saves",
            Stat::Shots => "shots",
            Stat::Assists => "assists",
        }
    }
}

impl FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wins" => Ok(Stat::Wins),
            "goals" => Ok(Stat::Goals),
            "mvps" => Ok(Stat::Mvps),
            "saves" => Ok(Stat::Saves),
            "shots" => Ok(Stat::Shots),
            "assists" => Ok(Stat::Assists),
            other => Err(format!("unknown stat {other:?}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub id: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub tier_id: u32,
    pub tier_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub season_id: u32,
    pub started_on: i64,
    #[serde(default)]
    pub ended_on: Option<i64>,
}

impl Season {
    pub fn is_current(&self) -> bool {
        self.ended_on.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Population {
    pub players: u64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: u32,
    pub platform_id: u32,
    pub name: String,
    #[serde(default)]
    pub population: Population,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub wins: u64,
    pub goals: u64,
    pub mvps: u64,
    pub saves: u64,
    pub shots: u64,
    pub assists: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankedStats {
    pub rank_points: Option<i64>,
    pub matches_played: Option<u32>,
    pub tier: Option<u32>,
    pub division: Option<u32>,
}

/// season id -> playlist id -> ranked stats
pub type RankedSeasons = BTreeMap<String, BTreeMap<String, RankedStats>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub unique_id: String,
    pub display_name: String,
    pub platform: PlatformInfo,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub signature_url: Option<String>,
    #[serde(default)]
    pub stats: PlayerStats,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub ranked_seasons: RankedSeasons,
    #[serde(default)]
    pub last_requested: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub next_update_at: Option<i64>,
}

impl Player {
    pub fn ranked(&self, season: u32, playlist: u32) -> Option<&RankedStats> {
        self.ranked_seasons
            .get(&season.to_string())?
            .get(&playlist.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultPage {
    pub page: u32,
    pub results: u32,
    pub total_results: u32,
    pub max_results_per_page: u32,
    #[serde(default)]
    pub data: Vec<Player>,
}

impl SearchResultPage {
    pub fn has_next(&self) -> bool {
        let seen = (u64::from(self.page) + 1) * u64::from(self.max_results_per_page);
        seen < u64::from(self.total_results)
    }
}

/// One entry of a batch player lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlayerRequest {
    pub unique_id: String,
    pub platform: Platform,
}

impl PlayerRequest {
    pub fn new(unique_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            unique_id: unique_id.into(),
            platform,
        }
    }
}

impl Serialize for PlayerRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("PlayerRequest", 2)?;
        s.serialize_field("platformId", &self.platform.id().to_string())?;
        s.serialize_field("uniqueId", &self.unique_id)?;
        s.end()
    }
}

/// `platform:unique_id`, e.g. `steam:76561198033338223`.
impl FromStr for PlayerRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (platform, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected platform:id, got {s:?}"))?;
        if id.is_empty() {
            return Err(format!("missing player id in {s:?}"));
        }
        Ok(Self::new(id, platform.parse()?))
    }
}

// the API sends `[]` instead of `{}` for players without ranked history
fn map_or_empty_list<'de, D>(deserializer: D) -> Result<RankedSeasons, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(RankedSeasons),
        List(Vec<serde::de::IgnoredAny>),
    }

    Ok(match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => map,
        MapOrList::List(_) => RankedSeasons::new(),
    })
}

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::client::{StatsApi, MAX_BATCH_PLAYERS};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{ApiError, Error};
use crate::executor::Executor;
use crate::handle::ResultHandle;
use crate::request::{Method, Request};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::*;

/// Rocket League Stats client.
///
/// Every call becomes a [`Request`] that goes through this client's own
/// [`Dispatcher`], so all calls made through one client share one rate
/// budget. Two clients never share anything.
pub struct RlStatsClient {
    api_key: String,
    api_version: String,
    dispatcher: Dispatcher,
}

impl RlStatsClient {
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    // requires RLSTATS_API_KEY env var
    // can use dotenv
    pub fn from_env() -> Result<Self, Error> {
        Self::new(Config::from_env()?)
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        if config.api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }
        check_base_url(&config.base_url)?;

        let executor = Executor::new(&config.base_url, transport);
        Ok(Self {
            api_key: config.api_key,
            api_version: config.api_version,
            dispatcher: Dispatcher::new(executor, config.dispatch),
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A request carrying this client's key and API version.
    pub fn request(&self, method: Method, path: impl Into<String>) -> Request {
        Request::new(method, path)
            .with_api_key(self.api_key.as_str())
            .with_api_version(self.api_version.as_str())
    }

    /// Queues a raw request; the handle resolves with the response JSON.
    pub fn submit(&self, request: Request) -> Result<ResultHandle, ApiError> {
        self.dispatcher.submit(request)
    }

    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: Request) -> Result<T, Error> {
        let value = self.dispatcher.submit(request)?.await?;
        Ok(serde_json::from_value(value).map_err(ApiError::from)?)
    }
}

fn check_base_url(base_url: &str) -> Result<(), Error> {
    let invalid = |reason: String| Error::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };
    let url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        "http" | "https" => Err(invalid("no host".into())),
        scheme => Err(invalid(format!("unsupported scheme {scheme:?}"))),
    }
}

#[async_trait]
impl StatsApi for RlStatsClient {
    async fn platforms(&self) -> Result<Vec<PlatformInfo>, Error> {
        self.fetch(self.request(Method::Get, "/data/platforms")).await
    }

    async fn tiers(&self, season: Option<u32>) -> Result<Vec<Tier>, Error> {
        let path = match season {
            Some(season) => format!("/data/tiers/{season}"),
            None => "/data/tiers".to_string(),
        };
        self.fetch(self.request(Method::Get, path)).await
    }

    async fn seasons(&self) -> Result<Vec<Season>, Error> {
        self.fetch(self.request(Method::Get, "/data/seasons")).await
    }

    async fn playlists(&self) -> Result<Vec<Playlist>, Error> {
        self.fetch(self.request(Method::Get, "/data/playlists")).await
    }

    async fn player(&self, unique_id: &str, platform: Platform) -> Result<Player, Error> {
        let request = self
            .request(Method::Get, "/player")
            .with_query("unique_id", unique_id)
            .with_query("platform_id", platform.id());
        self.fetch(request).await
    }

    async fn players(&self, requests: &[PlayerRequest]) -> Result<Vec<Player>, Error> {
        if requests.len() > MAX_BATCH_PLAYERS {
            return Err(Error::TooManyPlayers {
                max: MAX_BATCH_PLAYERS,
                got: requests.len(),
            });
        }
        let request = self
            .request(Method::Post, "/player/batch")
            .with_json_body(&requests)
            .map_err(ApiError::from)?;
        self.fetch(request).await
    }

    async fn search_players(
        &self,
        display_name: &str,
        page: u32,
    ) -> Result<SearchResultPage, Error> {
        let request = self
            .request(Method::Get, "/search/players")
            .with_query("display_name", display_name)
            .with_query("page", page);
        self.fetch(request).await
    }

    async fn ranked_leaderboard(&self, playlist_id: u32) -> Result<Vec<Player>, Error> {
        let request = self
            .request(Method::Get, "/leaderboard/ranked")
            .with_query("playlist_id", playlist_id);
        self.fetch(request).await
    }

    async fn stat_leaderboard(&self, stat: Stat) -> Result<Vec<Player>, Error> {
        let request = self
            .request(Method::Get, "/leaderboard/stat")
            .with_query("type", stat.query_name());
        self.fetch(request).await
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use mockito::Matcher;

    use crate::api_client::RlStatsClient;
    use crate::client::StatsApi;
    use crate::config::Config;
    use crate::error::{ApiError, Error};
    use crate::gate::RateLimit;
    use crate::types::{Platform, PlatformInfo, PlayerRequest, Stat};

    fn client(base_url: &str) -> RlStatsClient {
        let config = Config::new("asdf1234")
            .with_base_url(base_url)
            .with_rate_limit(RateLimit::new(100, Duration::from_secs(1)));
        RlStatsClient::new(config).unwrap()
    }

    const PLAYER_JSON: &str = r###"
        {
          "uniqueId": "76561198033338223",
          "displayName": "Squishy",
          "platform": {"id": 1, "name": "Steam"},
          "avatar": "https://example.com/avatar.jpg",
          "profileUrl": "https://rocketleaguestats.com/profile/1/76561198033338223",
          "signatureUrl": "https://signature.rocketleaguestats.com/normal/1/76561198033338223.png",
          "stats": {"wins": 3010, "goals": 9120, "mvps": 1490, "saves": 4087, "shots": 20034, "assists": 3521},
          "rankedSeasons": {
            "5": {
              "10": {"rankPoints": 1032, "matchesPlayed": 89, "tier": 15, "division": 1},
              "11": {"rankPoints": 1470, "matchesPlayed": 310, "tier": 18, "division": 3}
            }
          },
          "lastRequested": 1500000000,
          "createdAt": 1450000000,
          "updatedAt": 1500000000,
          "nextUpdateAt": 1500003600
        }
    "###;

    #[tokio::test]
    async fn test_fetch_platforms() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());

        let mock = server
            .mock("GET", "/v1/data/platforms")
            .match_header("authorization", "asdf1234")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"name":"Steam"},{"id":2,"name":"Ps4"},{"id":3,"name":"XboxOne"}]"#)
            .create_async()
            .await;

        let platforms = client.platforms().await.unwrap();
        mock.assert_async().await;

        assert_eq!(
            platforms,
            vec![
                PlatformInfo {
                    id: 1,
                    name: "Steam".into()
                },
                PlatformInfo {
                    id: 2,
                    name: "Ps4".into()
                },
                PlatformInfo {
                    id: 3,
                    name: "XboxOne".into()
                },
            ]
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_fetch_player() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());

        let mock = server
            .mock("GET", "/v1/player")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("unique_id".into(), "76561198033338223".into()),
                Matcher::UrlEncoded("platform_id".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(PLAYER_JSON)
            .create_async()
            .await;

        let player = client
            .player("76561198033338223", Platform::Steam)
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(player.display_name, "Squishy");
        assert_eq!(player.platform.id, 1);
        assert_eq!(player.stats.assists, 3521);
        assert_eq!(player.ranked(5, 11).and_then(|r| r.rank_points), Some(1470));
    }

    #[tokio::test]
    async fn test_fetch_players_batch() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());

        let mock = server
            .mock("POST", "/v1/player/batch")
            .match_header("content-type", "application/json")
            .match_body(Matcher::JsonString(
                r#"[{"platformId":"1","uniqueId":"76561198033338223"},{"platformId":"3","uniqueId":"Kronovi"}]"#.into(),
            ))
            .with_status(200)
            .with_body(format!("[{PLAYER_JSON}]"))
            .create_async()
            .await;

        let players = client
            .players(&[
                PlayerRequest::new("76561198033338223", Platform::Steam),
                PlayerRequest::new("Kronovi", Platform::XboxOne),
            ])
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(players.len(), 1);
        assert_eq!(players[0].unique_id, "76561198033338223");
    }

    #[tokio::test]
    async fn test_batch_limit_checked_before_submission() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());
        let mock = server
            .mock("POST", "/v1/player/batch")
            .expect(0)
            .create_async()
            .await;

        let requests = (0..11)
            .map(|i| PlayerRequest::new(format!("player{i}"), Platform::Ps4))
            .collect::<Vec<_>>();
        let err = client.players(&requests).await.unwrap_err();
        mock.assert_async().await;

        assert!(matches!(err, Error::TooManyPlayers { max: 10, got: 11 }));
    }

    #[tokio::test]
    async fn test_search_and_leaderboards() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());

        let search = server
            .mock("GET", "/v1/search/players")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("display_name".into(), "Squishy Muffinz".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"page":1,"results":1,"totalResults":21,"maxResultsPerPage":20,"data":[{PLAYER_JSON}]}}"#
            ))
            .create_async()
            .await;
        let ranked = server
            .mock("GET", "/v1/leaderboard/ranked")
            .match_query(Matcher::UrlEncoded("playlist_id".into(), "13".into()))
            .with_status(200)
            .with_body(format!("[{PLAYER_JSON},{PLAYER_JSON}]"))
            .create_async()
            .await;
        let stat = server
            .mock("GET", "/v1/leaderboard/stat")
            .match_query(Matcher::UrlEncoded("type".into(), "goals".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let page = client.search_players("Squishy Muffinz", 1).await.unwrap();
        assert_eq!(page.total_results, 21);
        assert_eq!(page.data.len(), 1);
        assert!(!page.has_next());

        assert_eq!(client.ranked_leaderboard(13).await.unwrap().len(), 2);
        assert!(client.stat_leaderboard(Stat::Goals).await.unwrap().is_empty());

        search.assert_async().await;
        ranked.assert_async().await;
        stat.assert_async().await;
    }

    #[tokio::test]
    async fn test_tiers_server_error() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());

        server
            .mock("GET", "/v1/data/tiers/4")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        match client.tiers(Some(4)).await {
            Err(Error::Api(ApiError::HttpStatus { code, body })) => {
                assert_eq!(code, 500);
                assert_eq!(body, "Internal Server Error");
            }
            other => panic!("expected HTTP 500, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let client = client(&server.url());

        server
            .mock("GET", "/v1/data/seasons")
            .with_status(200)
            .with_body(r#"{"seasons": "soon"}"#)
            .create_async()
            .await;

        let err = client.seasons().await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_are_rejected() {
        let server = mockito::Server::new_async().await;
        let client = client(&server.url());

        client.shutdown().await;
        let err = client.playlists().await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Rejected)));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let err = RlStatsClient::new(Config::new("  ")).err().unwrap();
        assert!(matches!(err, Error::MissingApiKey));
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        for url in ["not a url", "localhost:8080", "ftp://stats.test"] {
            let config = Config::new("asdf1234").with_base_url(url);
            match RlStatsClient::new(config) {
                Err(Error::InvalidBaseUrl { url: got, .. }) => assert_eq!(got, url),
                Err(other) => panic!("expected invalid base URL for {url:?}, got {other:?}"),
                Ok(_) => panic!("accepted base URL {url:?}"),
            }
        }

        assert!(RlStatsClient::new(Config::new("asdf1234").with_base_url("http://127.0.0.1:1")).is_ok());
    }
}

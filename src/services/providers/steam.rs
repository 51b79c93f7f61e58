/// Steam Web API provider
///
/// Wraps the three endpoints the recommender needs. Every request goes
/// through the same path, which applies the inter-request delay, the
/// per-request timeout and the retry policy.
///
/// API Flow:
/// 1. Friends: /ISteamUser/GetFriendList/v1 → ordered friend ids
/// 2. Library: /IPlayerService/GetOwnedGames/v1 → owned games with playtime
/// 3. Activity: /IPlayerService/GetRecentlyPlayedGames/v1 → last two weeks
use crate::{
    error::{AppError, AppResult},
    models::{
        steam::{ApiFriendListResponse, ApiGamesResponse},
        Item, MemberId,
    },
    services::providers::DataSource,
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

const FRIEND_LIST_PATH: &str = "ISteamUser/GetFriendList/v1";
const OWNED_GAMES_PATH: &str = "IPlayerService/GetOwnedGames/v1";
const RECENT_GAMES_PATH: &str = "IPlayerService/GetRecentlyPlayedGames/v1";

/// Connection and politeness settings for the Steam client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub api_url: String,
    /// Primary user, used when no member is given
    pub steam_id: String,
    pub rate_limit_delay: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

pub struct SteamProvider {
    http_client: HttpClient,
    settings: ClientSettings,
    /// When the previous request was sent
    last_request: Mutex<Option<Instant>>,
}

impl SteamProvider {
    pub fn new(settings: ClientSettings) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            settings,
            last_request: Mutex::new(None),
        })
    }

    fn steam_id<'a>(&'a self, member: &'a Option<MemberId>) -> &'a str {
        member
            .as_ref()
            .map(MemberId::as_str)
            .unwrap_or(self.settings.steam_id.as_str())
    }

    /// Waits until `rate_limit_delay` has passed since the previous request
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        let ready_at =
            (*last).and_then(|previous| previous.checked_add(self.settings.rate_limit_delay));
        if let Some(ready_at) = ready_at {
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET with retries for transient failures
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}/{}", self.settings.api_url, path);
        let mut attempt: u32 = 0;

        loop {
            match self.send_once(&url, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    let delay = self.settings.retry_delay.saturating_mul(attempt);
                    tracing::warn!(
                        error = %e,
                        path = %path,
                        attempt = attempt,
                        max_retries = self.settings.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Steam request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> AppResult<T> {
        self.throttle().await;

        let response = self
            .http_client
            .get(url)
            .query(&[("key", self.settings.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(error = %e, response = %body, "Failed to parse Steam response");
            AppError::Serialization(e)
        })
    }
}

/// Maps a non-success HTTP status to the error taxonomy
fn classify_status(status: StatusCode, body: &str) -> AppError {
    let detail = if body.is_empty() {
        format!("Steam API returned status {}", status)
    } else {
        format!("Steam API returned status {}: {}", status, body)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Authorization(detail),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(detail),
        _ => AppError::Network(detail),
    }
}

#[async_trait::async_trait]
impl DataSource for SteamProvider {
    async fn list_members(&self) -> AppResult<Vec<MemberId>> {
        let response: ApiFriendListResponse = self
            .get_json(
                FRIEND_LIST_PATH,
                &[
                    ("steamid", self.settings.steam_id.as_str()),
                    ("relationship", "friend"),
                ],
            )
            .await?;

        let members = response.into_members();
        tracing::info!(friends = members.len(), provider = "steam", "Friend list fetched");
        Ok(members)
    }

    async fn list_owned_items(&self, member: Option<MemberId>) -> AppResult<Vec<Item>> {
        let steam_id = self.steam_id(&member);
        let response: ApiGamesResponse = self
            .get_json(
                OWNED_GAMES_PATH,
                &[
                    ("steamid", steam_id),
                    ("include_appinfo", "true"),
                    ("include_played_free_games", "true"),
                    ("format", "json"),
                ],
            )
            .await?;

        let items = response.into_items();
        tracing::debug!(steam_id = %steam_id, games = items.len(), "Owned games fetched");
        Ok(items)
    }

    async fn list_recent_items(&self, member: Option<MemberId>) -> AppResult<Vec<Item>> {
        let steam_id = self.steam_id(&member);
        let response: ApiGamesResponse = self
            .get_json(
                RECENT_GAMES_PATH,
                &[("steamid", steam_id), ("format", "json")],
            )
            .await?;

        let items = response.into_items();
        tracing::debug!(steam_id = %steam_id, games = items.len(), "Recent games fetched");
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "steam"
    }
}

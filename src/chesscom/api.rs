//! chess.com public API client.
//!
//! All endpoints are unauthenticated GETs. The API rate-limits aggressively
//! when requests arrive in parallel, so the client is strictly sequential:
//! a fixed inter-request delay plus exponential backoff with jitter on 429
//! and 5xx responses.

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::chesscom::models::{ArchivesResponse, MonthlyGames, PlayerProfile, PlayerStats};
use crate::errors::ChessTrackError;

const MAX_RETRIES: u32 = 4;
const INITIAL_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Rate limiter - keeps a minimum interval between consecutive requests.
struct RateLimiter {
    last_request: std::time::Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: std::time::Instant::now() - min_interval,
            min_interval,
        }
    }

    async fn acquire(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            let wait_time = self.min_interval - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time.as_millis());
            sleep(wait_time).await;
        }
        self.last_request = std::time::Instant::now();
    }
}

pub struct ChessComClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl ChessComClient {
    pub fn new(base_url: &str, min_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("chesstrack/0.1 (game history sync)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(min_delay),
        })
    }

    /// List of monthly archive URLs, oldest first.
    pub async fn fetch_archives(&mut self, username: &str) -> Result<Vec<String>> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/player/{}/games/archives", self.base_url, username);
        let response = self.execute_with_retry(&url).await?;

        let archives: ArchivesResponse = response
            .json()
            .await
            .context("Failed to parse archives response")?;

        debug!(username = %username, months = archives.archives.len(), "fetched archive list");
        Ok(archives.archives)
    }

    /// One month's games. `archive_url` comes verbatim from `fetch_archives`.
    pub async fn fetch_month(&mut self, archive_url: &str) -> Result<MonthlyGames> {
        self.rate_limiter.acquire().await;

        let response = self.execute_with_retry(archive_url).await?;

        let month: MonthlyGames = response
            .json()
            .await
            .with_context(|| format!("Failed to parse month response from {}", archive_url))?;

        debug!(archive = %archive_url, games = month.games.len(), "fetched month");
        Ok(month)
    }

    pub async fn fetch_profile(&mut self, username: &str) -> Result<PlayerProfile> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/player/{}", self.base_url, username);
        let response = self.execute_with_retry(&url).await?;

        response
            .json()
            .await
            .context("Failed to parse profile response")
    }

    pub async fn fetch_stats(&mut self, username: &str) -> Result<PlayerStats> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/player/{}/stats", self.base_url, username);
        let response = self.execute_with_retry(&url).await?;

        response
            .json()
            .await
            .context("Failed to parse stats response")
    }

    /// Execute request with exponential backoff retry on 429 and 5xx.
    async fn execute_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut last_status: Option<u16> = None;

        for attempt in 0..MAX_RETRIES {
            let request = self.client.get(url);

            match timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), request.send()).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    } else if status == StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        last_status = Some(status.as_u16());
                        warn!(
                            "Upstream {} on attempt {}, backing off",
                            status,
                            attempt + 1
                        );
                    } else {
                        let text = response.text().await.unwrap_or_default();
                        return Err(ChessTrackError::Network {
                            status: Some(status.as_u16()),
                            message: format!("{}: {}", url, truncate(&text, 200)),
                        }
                        .into());
                    }
                }
                Ok(Err(e)) => {
                    last_status = None;
                    warn!("Request failed (attempt {}): {}", attempt + 1, e);
                }
                Err(_) => {
                    last_status = None;
                    warn!("Request timeout (attempt {})", attempt + 1);
                }
            }

            if attempt < MAX_RETRIES - 1 {
                let jitter = rand::thread_rng().gen_range(0..=backoff / 2);
                let wait = backoff + jitter;
                debug!("Retrying in {}ms", wait);
                sleep(Duration::from_millis(wait)).await;
                backoff = (backoff * 2).min(30_000);
            }
        }

        Err(ChessTrackError::Network {
            status: last_status,
            message: format!("max retries exceeded for {}", url),
        }
        .into())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

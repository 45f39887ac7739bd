//! Source API client with a read-through file cache
//!
//! Characters, quotes and movies are fetched page by page, joined so every
//! character carries its quotes, and cached as one JSON snapshot. A snapshot
//! younger than the configured age is served without touching the network.

use crate::config::SourceConfig;
use crate::http::{build_client, ensure_success};
use crate::model::{Character, Movie, QuoteFragment, SourceQuote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldc_common::{Result, SyncError};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Largest page the source API serves.
pub const PAGE_LIMIT: u32 = 1000;

const UNKNOWN_MOVIE: &str = "Unknown";

/// Anything that can produce the current character set
#[async_trait]
pub trait CharacterSource: Send + Sync {
    async fn fetch_characters(&self) -> Result<Vec<Character>>;
}

/// Counts over one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub character_count: usize,
    pub quote_count: usize,
    pub movie_count: usize,
    pub characters_with_quotes: usize,
}

/// Everything fetched in one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub characters: Vec<Character>,
    pub quotes: Vec<SourceQuote>,
    pub movies: Vec<Movie>,
    pub stats: SourceStats,
    #[serde(default)]
    pub cached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    docs: Vec<T>,
    #[serde(default)]
    pages: Option<u32>,
}

/// Attach quotes (with resolved movie names) to their characters.
pub fn enrich(
    characters: Vec<Character>,
    quotes: Vec<SourceQuote>,
    movies: Vec<Movie>,
) -> SourceSnapshot {
    let movie_names: HashMap<&str, &str> = movies
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()))
        .collect();

    let mut by_character: HashMap<&str, Vec<QuoteFragment>> = HashMap::new();
    for quote in &quotes {
        let Some(character_id) = quote.character.as_deref() else {
            continue;
        };
        let movie = quote
            .movie
            .as_deref()
            .and_then(|id| movie_names.get(id).copied())
            .unwrap_or(UNKNOWN_MOVIE);

        by_character
            .entry(character_id)
            .or_default()
            .push(QuoteFragment {
                dialog: Some(quote.dialog.clone().unwrap_or_default()),
                movie: Some(movie.to_string()),
            });
    }

    let characters_with_quotes = by_character.len();
    let characters: Vec<Character> = characters
        .into_iter()
        .map(|mut character| {
            let fragments = character
                .id
                .as_deref()
                .and_then(|id| by_character.get(id))
                .cloned()
                .unwrap_or_default();
            character.quote_count = fragments.len() as u64;
            character.sample_quotes = fragments;
            character
        })
        .collect();

    let stats = SourceStats {
        character_count: characters.len(),
        quote_count: quotes.len(),
        movie_count: movies.len(),
        characters_with_quotes,
    };

    SourceSnapshot {
        characters,
        quotes,
        movies,
        stats,
        cached_at: None,
    }
}

/// Client for the character/quote/movie source API
pub struct OneApiClient {
    client: Client,
    config: SourceConfig,
}

impl OneApiClient {
    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    /// Fresh cached snapshot, or a new one from the API
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, force_refresh: bool) -> Result<SourceSnapshot> {
        if !force_refresh {
            if let Some(snapshot) = self.load_cache().await {
                return Ok(snapshot);
            }
        }

        info!("Fetching all data from the source API");

        let characters: Vec<Character> = self.fetch_endpoint("character").await?;
        tokio::time::sleep(self.config.endpoint_delay).await;
        let quotes: Vec<SourceQuote> = self.fetch_endpoint("quote").await?;
        tokio::time::sleep(self.config.endpoint_delay).await;
        let movies: Vec<Movie> = self.fetch_endpoint("movie").await?;

        let mut snapshot = enrich(characters, quotes, movies);
        snapshot.cached_at = Some(Utc::now());

        info!(
            characters = snapshot.stats.character_count,
            quotes = snapshot.stats.quote_count,
            movies = snapshot.stats.movie_count,
            "Source data fetched"
        );

        self.save_cache(&snapshot).await;
        Ok(snapshot)
    }

    async fn fetch_endpoint<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut items = Vec::new();
        let mut page = 1u32;
        let mut total_pages = 1u32;

        while page <= total_pages {
            info!(endpoint, page, total_pages, "Fetching page");

            let response = self
                .client
                .get(&url)
                .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
                .header(ACCEPT, "application/json")
                .query(&[("limit", PAGE_LIMIT), ("page", page)])
                .send()
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(SyncError::auth(
                    "source API authentication failed; verify the API key at https://the-one-api.dev/account",
                ));
            }

            let body: Page<T> = ensure_success(response).await?.json().await?;
            items.extend(body.docs);
            total_pages = body.pages.unwrap_or(1);
            page += 1;

            if page <= total_pages {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        info!(endpoint, count = items.len(), "Endpoint fetched");
        Ok(items)
    }

    async fn load_cache(&self) -> Option<SourceSnapshot> {
        let path = self.config.cache_file();
        let raw = tokio::fs::read(&path).await.ok()?;

        let snapshot: SourceSnapshot = match serde_json::from_slice(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache, refetching");
                return None;
            },
        };

        let age = Utc::now() - snapshot.cached_at?;
        if age < chrono::Duration::hours(self.config.cache_max_age_hours) {
            info!(age_secs = age.num_seconds(), "Serving source data from cache");
            Some(snapshot)
        } else {
            info!(age_secs = age.num_seconds(), "Cache is stale");
            None
        }
    }

    async fn save_cache(&self, snapshot: &SourceSnapshot) {
        let path = self.config.cache_file();
        let result = async {
            tokio::fs::create_dir_all(&self.config.cache_dir).await?;
            let body = serde_json::to_vec_pretty(snapshot)?;
            tokio::fs::write(&path, body).await?;
            Ok::<_, SyncError>(())
        }
        .await;

        match result {
            Ok(()) => info!(path = %path.display(), "Cached source data"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not write cache"),
        }
    }
}

#[async_trait]
impl CharacterSource for OneApiClient {
    async fn fetch_characters(&self) -> Result<Vec<Character>> {
        Ok(self.fetch_all(false).await?.characters)
    }
}

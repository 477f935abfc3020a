//! HTTP client for the games API
//!
//! Used by the portal pages when they are pointed at a remote backend
//! instead of the in-process store.

use crate::db::GameRecord;
use crate::error::FetchError;
use crate::views::GameSource;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Health endpoint payload
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Typed client for `/api/games`
#[derive(Debug, Clone)]
pub struct GamesClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl GamesClient {
    /// `base_url` points at the API root, e.g. `http://localhost:3001/api`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the whole catalog
    pub async fn list_games(&self) -> Result<Vec<GameRecord>, FetchError> {
        let url = format!("{}/games", self.base_url);
        debug!(%url, "Fetching games");

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Fetch one record; `None` when the backend has no such id
    pub async fn get_game(&self, id: i64) -> Result<Option<GameRecord>, FetchError> {
        let url = format!("{}/games/{}", self.base_url, id);
        debug!(%url, "Fetching game");

        let response = self.http_client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub async fn health(&self) -> Result<HealthStatus, FetchError> {
        let url = format!("{}/health", self.base_url);

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl GameSource for GamesClient {
    async fn list_games(&self) -> Result<Vec<GameRecord>, FetchError> {
        GamesClient::list_games(self).await
    }

    async fn find_game(&self, id: i64) -> Result<Option<GameRecord>, FetchError> {
        self.get_game(id).await
    }
}

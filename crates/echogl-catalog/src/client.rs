//! Catalog API client

use crate::model::ExternalGame;
use crate::{AccessToken, CatalogError, CatalogGame};
use echogl_config::CatalogSettings;

/// Cross-reference category for Steam ids
const STEAM_CATEGORY: u32 = 1;

/// Queries the catalog for descriptive game data
#[derive(Debug, Clone)]
pub struct CatalogClient {
    token_url: String,
    api_url: String,
    client: reqwest::Client,
}

impl CatalogClient {
    /// Create a new catalog client
    pub fn new(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(format!("EchoGL/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            token_url: settings.token_url.clone(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Exchange client credentials for an access token.
    ///
    /// `None` means the whole enrichment pass should be abandoned.
    pub async fn authenticate(&self, client_id: &str, client_secret: &str) -> Option<AccessToken> {
        match self.request_token(client_id, client_secret).await {
            Ok(token) => {
                tracing::debug!("Catalog token acquired (expires in {:?}s)", token.expires_in);
                Some(token)
            }
            Err(e) => {
                tracing::error!("Catalog authentication failed: {}", e);
                None
            }
        }
    }

    /// Look up a Steam app id in the catalog.
    ///
    /// Tries the cross-reference table first and falls back to a free-text
    /// search. Failures at either step count as "no data".
    pub async fn lookup(&self, token: &AccessToken, client_id: &str, external_id: u32) -> Option<CatalogGame> {
        match self.lookup_external(token, client_id, external_id).await {
            Ok(Some(game)) => return Some(game),
            Ok(None) => {
                tracing::debug!("No cross-reference for {}, falling back to search", external_id);
            }
            Err(e) => tracing::warn!("Catalog cross-reference query for {} failed: {}", external_id, e),
        }

        match self.search(token, client_id, external_id).await {
            Ok(game) => game,
            Err(e) => {
                tracing::warn!("Catalog search for {} failed: {}", external_id, e);
                None
            }
        }
    }

    async fn request_token(&self, client_id: &str, client_secret: &str) -> Result<AccessToken, CatalogError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn lookup_external(
        &self,
        token: &AccessToken,
        client_id: &str,
        external_id: u32,
    ) -> Result<Option<CatalogGame>, CatalogError> {
        let rows: Vec<ExternalGame> = self
            .query(token, client_id, "external_games", external_games_query(external_id))
            .await?;

        Ok(rows.into_iter().next().and_then(ExternalGame::into_game))
    }

    async fn search(
        &self,
        token: &AccessToken,
        client_id: &str,
        external_id: u32,
    ) -> Result<Option<CatalogGame>, CatalogError> {
        let games: Vec<CatalogGame> = self
            .query(token, client_id, "games", search_query(external_id))
            .await?;

        Ok(games.into_iter().next())
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        token: &AccessToken,
        client_id: &str,
        endpoint: &str,
        body: String,
    ) -> Result<T, CatalogError> {
        let url = format!("{}/{}", self.api_url, endpoint);
        tracing::debug!("Catalog query {}: {}", url, body);

        let response = self
            .client
            .post(&url)
            .header("Client-ID", client_id)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CatalogError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

/// Exact Steam id match against the cross-reference table
pub fn external_games_query(external_id: u32) -> String {
    format!(
        "fields game.id,game.name,game.cover.url,game.genres.name,game.platforms.name,game.summary; \
         where uid = \"{}\" & category = {};",
        external_id, STEAM_CATEGORY
    )
}

/// Free-text search by the same id, top match only
pub fn search_query(external_id: u32) -> String {
    format!(
        "fields id,name,cover.url,genres.name,platforms.name,summary; search \"{}\"; limit 1;",
        external_id
    )
}

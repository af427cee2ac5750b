//! GIF search against Giphy and the last-search cache used by `show_gif`.

use crate::error::{CompanionError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_GIPHY_URL: &str = "https://api.giphy.com/v1/gifs";
pub const DEFAULT_LIMIT: u32 = 5;
pub const MAX_LIMIT: u32 = 10;

const GIPHY: &str = "Giphy";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GifRating {
    #[default]
    G,
    Pg,
    Pg13,
    R,
}

impl GifRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            GifRating::G => "g",
            GifRating::Pg => "pg",
            GifRating::Pg13 => "pg-13",
            GifRating::R => "r",
        }
    }
}

impl fmt::Display for GifRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GifRating {
    type Err = CompanionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "g" => Ok(GifRating::G),
            "pg" => Ok(GifRating::Pg),
            "pg-13" | "pg13" => Ok(GifRating::Pg13),
            "r" => Ok(GifRating::R),
            other => Err(CompanionError::validation(format!(
                "Unknown rating '{other}'; use g, pg, pg-13 or r"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifResult {
    pub title: String,
    pub preview_url: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait GifSearch: Send + Sync {
    async fn search(&self, query: &str, limit: u32, rating: GifRating) -> Result<Vec<GifResult>>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<GiphyGif>,
}

#[derive(Deserialize)]
struct GiphyGif {
    #[serde(default)]
    title: String,
    images: GiphyImages,
}

#[derive(Deserialize)]
struct GiphyImages {
    fixed_height: GiphyImage,
    preview_gif: Option<GiphyImage>,
    fixed_height_small: Option<GiphyImage>,
}

#[derive(Deserialize)]
struct GiphyImage {
    url: String,
    #[serde(default)]
    width: Option<String>,
    #[serde(default)]
    height: Option<String>,
}

fn dimension(value: &Option<String>) -> u32 {
    value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl From<GiphyGif> for GifResult {
    fn from(gif: GiphyGif) -> Self {
        let images = gif.images;
        let preview_url = images
            .preview_gif
            .or(images.fixed_height_small)
            .map(|i| i.url)
            .unwrap_or_else(|| images.fixed_height.url.clone());
        let title = if gif.title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            gif.title
        };
        GifResult {
            title,
            preview_url,
            width: dimension(&images.fixed_height.width),
            height: dimension(&images.fixed_height.height),
            url: images.fixed_height.url,
        }
    }
}

pub struct GiphyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GiphyClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl GifSearch for GiphyClient {
    async fn search(&self, query: &str, limit: u32, rating: GifRating) -> Result<Vec<GifResult>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CompanionError::unreachable(GIPHY, "GIPHY_API_KEY is not set; add it to the environment or .env")
        })?;

        let limit = limit.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("api_key", api_key),
                ("q", query),
                ("limit", limit.as_str()),
                ("rating", rating.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CompanionError::unreachable(GIPHY, format!("search failed ({e})")))?
            .error_for_status()
            .map_err(|e| CompanionError::unreachable(GIPHY, format!("search was rejected ({e})")))?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CompanionError::unreachable(GIPHY, format!("unexpected response ({e})")))?;
        debug!(query, results = body.data.len(), "Giphy search returned");
        Ok(body.data.into_iter().map(GifResult::from).collect())
    }
}

/// Runs searches and remembers the latest results so a later call can pick
/// one by its 1-based number.
pub struct GifGallery {
    search: Box<dyn GifSearch>,
    last: Mutex<Vec<GifResult>>,
}

impl GifGallery {
    pub fn new(search: Box<dyn GifSearch>) -> Self {
        Self {
            search,
            last: Mutex::new(Vec::new()),
        }
    }

    /// Searches for `query`, replacing the remembered results. `limit` is
    /// clamped to `1..=MAX_LIMIT`.
    pub async fn search(&self, query: &str, limit: u32, rating: GifRating) -> Result<Vec<GifResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CompanionError::validation("Search query must not be empty"));
        }
        let limit = limit.clamp(1, MAX_LIMIT);

        let results = self.search.search(query, limit, rating).await?;
        info!(query, %rating, count = results.len(), "GIF search");
        *self.last.lock().await = results.clone();
        Ok(results)
    }

    /// Resolves a 1-based result number from the last search.
    pub async fn resolve(&self, number: usize) -> Result<GifResult> {
        let last = self.last.lock().await;
        if last.is_empty() {
            return Err(CompanionError::not_found(
                "GIF",
                format!("#{number}; no search results yet, search for GIFs first"),
            ));
        }
        number
            .checked_sub(1)
            .and_then(|i| last.get(i))
            .cloned()
            .ok_or_else(|| {
                CompanionError::not_found(
                    "GIF",
                    format!("#{number}; choose a number between 1 and {}", last.len()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeSearch;

    #[async_trait]
    impl GifSearch for FakeSearch {
        async fn search(&self, query: &str, limit: u32, _rating: GifRating) -> Result<Vec<GifResult>> {
            Ok((1..=limit)
                .map(|i| GifResult {
                    title: format!("{query} {i}"),
                    preview_url: format!("https://gifs.test/{i}/preview.gif"),
                    url: format!("https://gifs.test/{i}/full.gif"),
                    width: 200,
                    height: 200,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_resolve_by_number_after_search() {
        let gallery = GifGallery::new(Box::new(FakeSearch));
        let results = gallery.search("happy cat", 3, GifRating::G).await.unwrap();
        assert_eq!(results.len(), 3);

        let first = gallery.resolve(1).await.unwrap();
        assert_eq!(first.url, results[0].url);

        let err = gallery.resolve(5).await.unwrap_err();
        assert!(matches!(err, CompanionError::NotFound { .. }));
        assert!(err.to_string().contains("between 1 and 3"));
        assert!(gallery.resolve(0).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_without_search_and_limit_clamp() {
        let gallery = GifGallery::new(Box::new(FakeSearch));
        assert!(gallery.resolve(1).await.unwrap_err().to_string().contains("search"));

        assert_eq!(gallery.search("dog", 50, GifRating::Pg).await.unwrap().len(), 10);
        assert_eq!(gallery.search("dog", 0, GifRating::Pg).await.unwrap().len(), 1);
        assert!(gallery.search("  ", 3, GifRating::G).await.is_err());
    }

    #[test]
    fn test_rating_parse() {
        assert_eq!("PG-13".parse::<GifRating>().unwrap(), GifRating::Pg13);
        assert_eq!("r".parse::<GifRating>().unwrap(), GifRating::R);
        assert!("nc-17".parse::<GifRating>().is_err());
    }

    #[tokio::test]
    async fn test_giphy_client_parses_search_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("api_key", "secret"))
            .and(query_param("q", "happy cat"))
            .and(query_param("limit", "2"))
            .and(query_param("rating", "pg-13"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {
                        "title": "Happy Cat",
                        "images": {
                            "fixed_height": { "url": "https://media.test/1.gif", "width": "356", "height": "200" },
                            "preview_gif": { "url": "https://media.test/1p.gif" },
                            "fixed_height_small": { "url": "https://media.test/1s.gif" }
                        }
                    },
                    {
                        "title": "",
                        "images": {
                            "fixed_height": { "url": "https://media.test/2.gif", "width": "200", "height": "200" },
                            "fixed_height_small": { "url": "https://media.test/2s.gif" }
                        }
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GiphyClient::new(server.uri(), Some("secret".into()));
        let results = client.search("happy cat", 2, GifRating::Pg13).await.unwrap();
        assert_eq!(
            results,
            vec![
                GifResult {
                    title: "Happy Cat".into(),
                    preview_url: "https://media.test/1p.gif".into(),
                    url: "https://media.test/1.gif".into(),
                    width: 356,
                    height: 200,
                },
                GifResult {
                    title: "Untitled".into(),
                    preview_url: "https://media.test/2s.gif".into(),
                    url: "https://media.test/2.gif".into(),
                    width: 200,
                    height: 200,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_is_reported() {
        let client = GiphyClient::new(DEFAULT_GIPHY_URL, None);
        let err = client.search("cat", 1, GifRating::G).await.unwrap_err();
        assert!(err.is_unreachable());
        assert!(err.to_string().contains("GIPHY_API_KEY"));
    }
}

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{excerpt, SearchError};

pub const SERPER_URL: &str = "https://google.serper.dev/search";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub position: u32,
}

/// Ranked web search used to discover competitor pages for a keyword.
pub trait WebSearcher {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SearchHit>, SearchError>> + Send;
}

pub struct SerperSearcher {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Deserialize)]
struct SerperOrganic {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    position: Option<u32>,
}

impl SerperSearcher {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }
}

impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        info!("Searching for \"{}\" (top {})", query, limit);
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest { q: query, num: limit })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let hits: Vec<SearchHit> = parse_serper(&body)?.into_iter().take(limit).collect();
        for hit in &hits {
            debug!(position = hit.position, url = %hit.url, title = %hit.title, "search hit");
        }
        Ok(hits)
    }
}

fn parse_serper(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: SerperResponse = serde_json::from_str(body)?;
    Ok(parsed
        .organic
        .into_iter()
        .enumerate()
        .map(|(i, o)| SearchHit {
            url: o.link,
            title: o.title,
            position: o.position.unwrap_or(i as u32 + 1),
        })
        .collect())
}

/// Drop duplicate URLs and the page being optimized, keeping rank order.
pub fn competitor_urls(hits: &[SearchHit], own_url: Option<&str>) -> Vec<String> {
    let own = own_url.map(normalize_url);
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|h| h.url.starts_with("http"))
        .filter(|h| own.as_deref() != Some(normalize_url(&h.url).as_str()))
        .filter(|h| seen.insert(normalize_url(&h.url)))
        .map(|h| h.url.clone())
        .collect()
}

fn normalize_url(url: &str) -> String {
    url.split('#')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .replacen("://www.", "://", 1)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, position: u32) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: String::new(),
            position,
        }
    }

    #[test]
    fn parses_organic_results_in_rank_order() {
        let body = r#"{
            "searchParameters": {"q": "widgets"},
            "organic": [
                {"title": "Acme", "link": "https://acme.com/widgets", "position": 1},
                {"title": "Globex", "link": "https://globex.com/w"}
            ]
        }"#;
        let hits = parse_serper(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://acme.com/widgets");
        assert_eq!(hits[1].position, 2);
    }

    #[test]
    fn missing_organic_is_empty() {
        assert!(parse_serper("{}").unwrap().is_empty());
        assert!(matches!(parse_serper("not json"), Err(SearchError::Decode(_))));
    }

    #[tokio::test]
    async fn posts_query_with_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_header("x-api-key", "serper-key")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"q": "blue widgets", "num": 2}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"organic":[{"title":"A","link":"https://a.example"},
                              {"title":"B","link":"https://b.example"},
                              {"title":"C","link":"https://c.example"}]}"#,
            )
            .create_async()
            .await;

        let searcher = SerperSearcher::new(
            format!("{}/search", server.url()),
            "serper-key",
            Duration::from_secs(5),
        )
        .unwrap();
        let hits = searcher.search("blue widgets", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "B");
    }

    #[tokio::test]
    async fn rejected_key_is_a_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_status(403)
            .with_body("Unauthorized.")
            .create_async()
            .await;

        let searcher =
            SerperSearcher::new(format!("{}/search", server.url()), "bad", Duration::from_secs(5))
                .unwrap();
        let err = searcher.search("widgets", 5).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Status { status: 403, ref body } if body == "Unauthorized."
        ));
    }

    #[test]
    fn filters_own_page_and_duplicates() {
        let hits = vec![
            hit("https://www.mysite.com/widgets/", 1),
            hit("https://acme.com/widgets", 2),
            hit("https://acme.com/widgets#faq", 3),
            hit("ftp://old.example.com", 4),
            hit("https://globex.com/w", 5),
        ];
        let urls = competitor_urls(&hits, Some("https://mysite.com/widgets"));
        assert_eq!(urls, vec!["https://acme.com/widgets", "https://globex.com/w"]);
    }
}

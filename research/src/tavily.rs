//! Client for the Tavily search and extract endpoints.
//!
//! Each call fans out one request per keyword or URL, all in flight at
//! once, and fails as a whole if any of them fails.

use crate::config::Config;
use agent::callbacks::{RESULT_LOG_LIMIT, truncate};
use agent::{Error, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const MAX_RESULTS: i64 = 20;
pub const DEFAULT_NUM_RESULTS: i64 = 6;

/// Sends one JSON request to the backend and returns the decoded body.
/// Status codes of 400 and above are reported as `ToolBackendError`.
#[async_trait]
pub trait Transport {
    async fn post(&self, path: &str, body: Value) -> Result<Value>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Every request gets its own connect and total timeout of `timeout`.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| Error::ConfigError(format!("invalid tavily api key: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn backend_error(err: reqwest::Error) -> Error {
    Error::ToolBackendError {
        status: err.status().map(|s| s.as_u16()),
        detail: err.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(backend_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(backend_error)?;

        if status >= 400 {
            // prefer the json error body, fall back to the raw text
            let detail = serde_json::from_str::<Value>(&text)
                .map(|v| v.to_string())
                .unwrap_or(text);
            return Err(Error::ToolBackendError {
                status: Some(status),
                detail,
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::ToolBackendError {
            status: Some(status),
            detail: format!("malformed response body: {}", e),
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct KeywordResult {
    pub keyword: String,
    pub response: Value,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SearchBundle {
    pub queries: Vec<KeywordResult>,
    pub combined_answer: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UrlResult {
    pub url: String,
    pub response: Value,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExtractionBundle {
    pub extractions: Vec<UrlResult>,
}

/// Joins the non-empty per-keyword answers, in keyword order.
fn combined_answer(queries: &[KeywordResult]) -> String {
    queries
        .iter()
        .filter_map(|q| q.response.get("answer").and_then(Value::as_str))
        .filter(|answer| !answer.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub struct TavilyClient {
    transport: Box<dyn Transport + Send + Sync>,
}

impl TavilyClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_transport(Box::new(HttpTransport::new(
            &config.tavily_api_key,
            &config.tavily_base_url,
            config.request_timeout,
        )?)))
    }

    pub fn with_transport(transport: Box<dyn Transport + Send + Sync>) -> Self {
        Self { transport }
    }

    pub async fn search(&self, keywords: &[String], num_results: i64) -> Result<SearchBundle> {
        if keywords.is_empty() {
            return Err(Error::ToolInputError(
                "search requires at least one keyword".to_string(),
            ));
        }
        if !(1..=MAX_RESULTS).contains(&num_results) {
            return Err(Error::ToolInputError(format!(
                "num_results must be between 1 and {}, got {}",
                MAX_RESULTS, num_results
            )));
        }

        let requests = keywords.iter().map(|keyword| {
            let payload = json!({
                "query": keyword,
                "include_answer": "advanced",
                "include_raw_content": false,
                "include_images": true,
                "include_image_descriptions": true,
                "search_depth": "advanced",
                "max_results": num_results,
            });
            debug!("POST /search {}", truncate(&payload.to_string(), RESULT_LOG_LIMIT));
            self.transport.post("/search", payload)
        });

        let responses = try_join_all(requests).await?;

        let queries = keywords
            .iter()
            .zip(responses)
            .map(|(keyword, response)| KeywordResult {
                keyword: keyword.clone(),
                response,
            })
            .collect::<Vec<_>>();

        Ok(SearchBundle {
            combined_answer: combined_answer(&queries),
            queries,
        })
    }

    pub async fn extract(&self, urls: &[String]) -> Result<ExtractionBundle> {
        if urls.is_empty() {
            return Err(Error::ToolInputError(
                "extract requires at least one URL".to_string(),
            ));
        }

        let requests = urls.iter().map(|url| {
            let payload = json!({
                "urls": url,
                "extract_depth": "advanced",
                "format": "markdown",
                "include_images": false,
                "include_favicon": false,
            });
            debug!("POST /extract {}", truncate(&payload.to_string(), RESULT_LOG_LIMIT));
            self.transport.post("/extract", payload)
        });

        let responses = try_join_all(requests).await?;

        Ok(ExtractionBundle {
            extractions: urls
                .iter()
                .zip(responses)
                .map(|(url, response)| UrlResult {
                    url: url.clone(),
                    response,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpTransport, KeywordResult, TavilyClient, Transport, combined_answer};
    use crate::testing::MockTransport;
    use agent::{Error, Result};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accepts one connection, reads the whole request, then sends
    /// `response`, or never answers when it is `None`. The handle yields
    /// the raw request.
    async fn serve_once(response: Option<String>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            match response {
                Some(response) => socket.write_all(response.as_bytes()).await.unwrap(),
                None => tokio::time::sleep(Duration::from_secs(10)).await,
            }
            request
        });

        (base_url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .map(|(_, value)| value.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> Option<String> {
        Some(format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        ))
    }

    fn transport(base_url: &str, timeout: Duration) -> HttpTransport {
        HttpTransport::new("tvly-test", base_url, timeout).unwrap()
    }

    #[tokio::test]
    async fn test_http_success() -> Result<()> {
        let (base_url, server) = serve_once(http_response(
            "200 OK",
            "application/json",
            "{\"answer\":\"ok\"}",
        ))
        .await;

        let body = transport(&base_url, Duration::from_secs(5))
            .post("/search", json!({ "query": "rust" }))
            .await?;
        assert_eq!(body, json!({ "answer": "ok" }));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /search HTTP/1.1"));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("authorization: bearer tvly-test")
        );
        assert!(request.ends_with("{\"query\":\"rust\"}"));
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_status_prefers_json_detail() {
        let (base_url, _server) = serve_once(http_response(
            "432 Plan Limit",
            "application/json",
            "{\"detail\":\"limited\"}",
        ))
        .await;

        let err = transport(&base_url, Duration::from_secs(5))
            .post("/search", json!({}))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::ToolBackendError { status: Some(432), detail } if detail == "{\"detail\":\"limited\"}"
        ));
    }

    #[tokio::test]
    async fn test_http_error_status_falls_back_to_text() {
        let (base_url, _server) = serve_once(http_response(
            "500 Internal Server Error",
            "text/plain",
            "oops",
        ))
        .await;

        let err = transport(&base_url, Duration::from_secs(5))
            .post("/extract", json!({}))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::ToolBackendError { status: Some(500), detail } if detail == "oops"
        ));
    }

    #[tokio::test]
    async fn test_http_malformed_body() {
        let (base_url, _server) =
            serve_once(http_response("200 OK", "application/json", "nope")).await;

        let err = transport(&base_url, Duration::from_secs(5))
            .post("/search", json!({}))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::ToolBackendError { status: Some(200), detail } if detail.starts_with("malformed response body")
        ));
    }

    #[tokio::test]
    async fn test_http_timeout() {
        let (base_url, _server) = serve_once(None).await;

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            transport(&base_url, Duration::from_millis(300)).post("/search", json!({})),
        )
        .await
        .expect("request timeout was not applied")
        .err()
        .unwrap();

        assert!(matches!(err, Error::ToolBackendError { status: None, .. }));
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_search_validates_before_network() {
        let transport = MockTransport::new();
        let client = TavilyClient::with_transport(Box::new(transport.clone()));

        let err = client.search(&[], 6).await.err().unwrap();
        assert!(matches!(err, Error::ToolInputError(_)));

        for bad in [0, -1, 21, 100] {
            let err = client.search(&strings(&["rust"]), bad).await.err().unwrap();
            assert!(matches!(err, Error::ToolInputError(_)));
        }

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_search_payload_and_order() -> Result<()> {
        // earlier keywords answer later
        let transport = MockTransport::new()
            .delay(|body| match body["query"].as_str() {
                Some("first") => 60,
                Some("second") => 30,
                _ => 0,
            })
            .respond(|_, body| Ok(json!({ "answer": format!("about {}", body["query"].as_str().unwrap()) })));
        let client = TavilyClient::with_transport(Box::new(transport.clone()));

        let bundle = client
            .search(&strings(&["first", "second", "third"]), 20)
            .await?;

        let keywords = bundle
            .queries
            .iter()
            .map(|q| q.keyword.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keywords, vec!["first", "second", "third"]);
        assert_eq!(bundle.queries[0].response["answer"], "about first");
        assert_eq!(
            bundle.combined_answer,
            "about first\nabout second\nabout third"
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        let (path, body) = &requests[0];
        assert_eq!(path, "/search");
        assert_eq!(body["include_answer"], "advanced");
        assert_eq!(body["include_raw_content"], false);
        assert_eq!(body["include_images"], true);
        assert_eq!(body["include_image_descriptions"], true);
        assert_eq!(body["search_depth"], "advanced");
        assert_eq!(body["max_results"], 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_search_fans_out_concurrently() -> Result<()> {
        let transport = MockTransport::new().rendezvous(4);
        let client = TavilyClient::with_transport(Box::new(transport.clone()));

        let bundle = tokio::time::timeout(
            Duration::from_secs(5),
            client.search(&strings(&["a", "b", "c", "d"]), 6),
        )
        .await
        .expect("search requests were not dispatched concurrently")?;

        assert_eq!(bundle.queries.len(), 4);
        assert_eq!(transport.requests().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_fails_as_a_whole() {
        let transport = MockTransport::new().respond(|_, body| {
            if body["query"] == "bad" {
                Err(Error::ToolBackendError {
                    status: Some(432),
                    detail: "{\"detail\":\"plan limit\"}".to_string(),
                })
            } else {
                Ok(json!({ "answer": "fine" }))
            }
        });
        let client = TavilyClient::with_transport(Box::new(transport));

        let err = client
            .search(&strings(&["good", "bad", "good"]), 6)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::ToolBackendError { status: Some(432), .. }));
    }

    #[tokio::test]
    async fn test_extract() -> Result<()> {
        let transport = MockTransport::new()
            .delay(|body| if body["urls"] == "https://a.example" { 40 } else { 0 })
            .respond(|_, body| Ok(json!({ "results": [{ "url": body["urls"] }] })));
        let client = TavilyClient::with_transport(Box::new(transport.clone()));

        let bundle = client
            .extract(&strings(&["https://a.example", "https://b.example"]))
            .await?;

        assert_eq!(bundle.extractions.len(), 2);
        assert_eq!(bundle.extractions[0].url, "https://a.example");
        assert_eq!(
            bundle.extractions[1].response["results"][0]["url"],
            "https://b.example"
        );

        let requests = transport.requests();
        let (path, body) = &requests[0];
        assert_eq!(path, "/extract");
        assert_eq!(body["extract_depth"], "advanced");
        assert_eq!(body["format"], "markdown");
        assert_eq!(body["include_images"], false);
        assert_eq!(body["include_favicon"], false);

        assert_eq!(
            serde_json::to_value(&bundle)?,
            json!({ "extractions": [
                { "url": "https://a.example", "response": { "results": [{ "url": "https://a.example" }] } },
                { "url": "https://b.example", "response": { "results": [{ "url": "https://b.example" }] } },
            ]})
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_urls() {
        let transport = MockTransport::new();
        let client = TavilyClient::with_transport(Box::new(transport.clone()));

        let err = client.extract(&[]).await.err().unwrap();

        assert!(matches!(err, Error::ToolInputError(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_extract_fails_as_a_whole() {
        let transport = MockTransport::new().respond(|_, body| {
            if body["urls"] == "https://down.example" {
                Err(Error::ToolBackendError {
                    status: Some(502),
                    detail: "bad gateway".to_string(),
                })
            } else {
                Ok(json!({}))
            }
        });
        let client = TavilyClient::with_transport(Box::new(transport));

        let err = client
            .extract(&strings(&["https://up.example", "https://down.example"]))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::ToolBackendError { status: Some(502), .. }));
    }

    #[test]
    fn test_combined_answer_skips_missing() {
        let queries = vec![
            KeywordResult {
                keyword: "a".to_string(),
                response: json!({ "answer": "  first" }),
            },
            KeywordResult {
                keyword: "b".to_string(),
                response: json!({ "results": [] }),
            },
            KeywordResult {
                keyword: "c".to_string(),
                response: json!({ "answer": "" }),
            },
            KeywordResult {
                keyword: "d".to_string(),
                response: json!({ "answer": null }),
            },
            KeywordResult {
                keyword: "e".to_string(),
                response: json!({ "answer": "last\n" }),
            },
        ];

        assert_eq!(combined_answer(&queries), "first\nlast");
        assert_eq!(combined_answer(&[]), "");
    }
}

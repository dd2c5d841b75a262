use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CatalogueError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const ACCEPT_JSON: &str = "application/json, */*";
pub const ACCEPT_IMAGE: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub query: &'a [(&'a str, String)],
    pub accept: &'a str,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.contains("image"))
            .unwrap_or(false)
    }
}

pub trait HttpTransport: Send + Sync {
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, CatalogueError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, CatalogueError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| CatalogueError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, CatalogueError> {
        let mut builder = self
            .client
            .get(request.url)
            .query(request.query)
            .header(ACCEPT, request.accept);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .send()
            .map_err(|err| CatalogueError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = response
            .bytes()
            .map_err(|err| CatalogueError::Http(err.to_string()))?;
        Ok(HttpResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct Fetcher<T: HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> Fetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch(&self, url: &str, query: &[(&str, String)]) -> Option<HttpResponse> {
        self.fetch_with(url, query, self.policy)
    }

    // GET `url` until a 200 arrives. A 404 is confirmed absence and ends the
    // loop at once; anything else is retried after `policy.backoff` until
    // `policy.retries` attempts are spent. At least one attempt is made.
    pub fn fetch_with(
        &self,
        url: &str,
        query: &[(&str, String)],
        policy: RetryPolicy,
    ) -> Option<HttpResponse> {
        let request = HttpRequest {
            url,
            query,
            accept: ACCEPT_JSON,
            timeout: None,
        };
        let attempts = policy.retries.max(1);
        for attempt in 1..=attempts {
            match self.transport.get(&request) {
                Ok(response) if response.status == 200 => return Some(response),
                Ok(response) if response.status == 404 => {
                    debug!(url, "not found");
                    return None;
                }
                Ok(response) => {
                    warn!(url, status = response.status, attempt, attempts, "retrying request");
                }
                Err(err) => {
                    warn!(url, error = %err, attempt, attempts, "retrying request");
                }
            }
            if attempt < attempts {
                thread::sleep(policy.backoff);
            }
        }
        None
    }

    pub fn download(&self, url: &str, timeout: Duration) -> Result<HttpResponse, CatalogueError> {
        self.transport.get(&HttpRequest {
            url,
            query: &[],
            accept: ACCEPT_IMAGE,
            timeout: Some(timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    struct Scripted {
        replies: Mutex<VecDeque<Result<u16, String>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<u16, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl HttpTransport for Scripted {
        fn get(&self, _request: &HttpRequest<'_>) -> Result<HttpResponse, CatalogueError> {
            *self.calls.lock().unwrap() += 1;
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(500));
            reply
                .map(|status| HttpResponse {
                    status,
                    content_type: Some("application/json".to_string()),
                    body: format!("{{\"status\":{status}}}").into_bytes(),
                })
                .map_err(CatalogueError::Http)
        }
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn recovers_after_two_failures() {
        let fetcher = Fetcher::new(
            Scripted::new(vec![Err("connection reset".to_string()), Ok(503), Ok(200)]),
            policy(3),
        );
        let response = fetcher.fetch("https://example.test", &[]).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()["status"], 200);
        assert_eq!(fetcher.transport().calls(), 3);
    }

    #[test]
    fn not_found_is_terminal() {
        let fetcher = Fetcher::new(Scripted::new(vec![Ok(404), Ok(200)]), policy(3));
        assert!(fetcher.fetch("https://example.test", &[]).is_none());
        assert_eq!(fetcher.transport().calls(), 1);
    }

    #[test]
    fn gives_up_after_retries() {
        let fetcher = Fetcher::new(Scripted::new(vec![Ok(500), Ok(502), Ok(200)]), policy(2));
        assert!(fetcher.fetch("https://example.test", &[]).is_none());
        assert_eq!(fetcher.transport().calls(), 2);
    }

    #[test]
    fn zero_retries_still_attempts_once() {
        let fetcher = Fetcher::new(Scripted::new(vec![Ok(200)]), policy(0));
        assert!(fetcher.fetch("https://example.test", &[]).is_some());
        assert_eq!(fetcher.transport().calls(), 1);
    }
}

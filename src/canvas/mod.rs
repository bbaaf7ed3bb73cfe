use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::canvas::model::{Assignment, CanvasId, Observee, Submission};
use crate::config::Config;

pub mod model;

/// Largest page Canvas serves without an admin-raised limit.
const PAGE_SIZE: &str = "100";
/// Upper bound on `Link: rel="next"` hops for one listing.
const MAX_PAGES: usize = 20;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("invalid Canvas base URL: {0}")]
    InvalidUrl(String),
    #[error("failed to reach Canvas: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Canvas error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("API response malformed: {0}")]
    Malformed(String),
}

/// Assignment bucket filter understood by the assignments endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Upcoming,
    Unsubmitted,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Upcoming => "upcoming",
            Bucket::Unsubmitted => "unsubmitted",
        }
    }
}

/// Read-only view of the Canvas API used by the aggregator.
#[async_trait]
pub trait CanvasService: Send + Sync {
    async fn list_assignments(
        &self,
        course_id: &str,
        bucket: Bucket,
    ) -> Result<Vec<Assignment>, CanvasError>;

    async fn get_submission(
        &self,
        course_id: &str,
        assignment_id: &CanvasId,
        student_id: &str,
    ) -> Result<Submission, CanvasError>;
}

#[derive(Clone)]
pub struct CanvasClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CanvasClient {
    pub fn new(base_url: &str, token: String) -> Result<Self, CanvasError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|err| CanvasError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(CanvasError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .user_agent(concat!("canvas-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, CanvasError> {
        Self::new(&cfg.canvas.base_url, cfg.canvas.token.clone())
    }

    /// `{base}/api/v1/<segments...>`, keeping any path prefix of the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, CanvasError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CanvasError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    pub fn build_get(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<reqwest::Request, CanvasError> {
        let url = self.endpoint(segments)?;
        Ok(self.get_url(url).query(query).build()?)
    }

    fn get_url(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
    }

    /// Body plus the `rel="next"` page from the `Link` header, if any.
    async fn fetch_page(
        &self,
        request: reqwest::Request,
    ) -> Result<(String, Option<Url>), CanvasError> {
        debug!(url = %request.url(), "canvas GET");
        let res = self.http.execute(request).await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Canvas API error");
            return Err(CanvasError::Status { status, body });
        }
        let next = res
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|h| h.to_str().ok())
            .and_then(next_link);
        Ok((res.text().await?, next))
    }

    async fn fetch_text(&self, request: reqwest::Request) -> Result<String, CanvasError> {
        let (body, _) = self.fetch_page(request).await?;
        Ok(body)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: reqwest::Request,
    ) -> Result<T, CanvasError> {
        let body = self.fetch_text(request).await?;
        serde_json::from_str(&body).map_err(|err| CanvasError::Malformed(err.to_string()))
    }

    pub async fn list_assignments(
        &self,
        course_id: &str,
        bucket: Bucket,
    ) -> Result<Vec<Assignment>, CanvasError> {
        let first = self.build_get(
            &["courses", course_id, "assignments"],
            &[("bucket", bucket.as_str()), ("per_page", PAGE_SIZE)],
        )?;
        let mut assignments = Vec::new();
        let mut pending = Some(first);
        let mut pages = 0;
        while let Some(request) = pending.take() {
            pages += 1;
            let (body, next) = self.fetch_page(request).await?;
            assignments.extend(parse_assignment_list(&body)?);
            pending = match next {
                Some(url) if pages < MAX_PAGES => Some(self.get_url(url).build()?),
                Some(_) => {
                    warn!(course_id, pages, "assignment listing truncated");
                    None
                }
                None => None,
            };
        }
        Ok(assignments)
    }

    pub async fn get_submission(
        &self,
        course_id: &str,
        assignment_id: &CanvasId,
        student_id: &str,
    ) -> Result<Submission, CanvasError> {
        let request = self.build_get(
            &[
                "courses",
                course_id,
                "assignments",
                &assignment_id.0,
                "submissions",
                student_id,
            ],
            &[],
        )?;
        self.fetch_json(request).await
    }

    /// Students visible to the observer account behind the token.
    pub async fn list_observees(&self) -> Result<Vec<Observee>, CanvasError> {
        let request = self.build_get(&["users", "self", "observees"], &[])?;
        self.fetch_json(request).await
    }
}

#[async_trait]
impl CanvasService for CanvasClient {
    async fn list_assignments(
        &self,
        course_id: &str,
        bucket: Bucket,
    ) -> Result<Vec<Assignment>, CanvasError> {
        CanvasClient::list_assignments(self, course_id, bucket).await
    }

    async fn get_submission(
        &self,
        course_id: &str,
        assignment_id: &CanvasId,
        student_id: &str,
    ) -> Result<Submission, CanvasError> {
        CanvasClient::get_submission(self, course_id, assignment_id, student_id).await
    }
}

/// Decode an assignment listing. Anything other than an array of objects
/// carrying `id` and `name` is reported as malformed.
pub fn parse_assignment_list(body: &str) -> Result<Vec<Assignment>, CanvasError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| CanvasError::Malformed(err.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(CanvasError::Malformed(format!(
                "expected an array, got {}",
                json_kind(&other)
            )))
        }
    };
    items
        .into_iter()
        .map(|item| {
            if !item.is_object() {
                return Err(CanvasError::Malformed(format!(
                    "expected an object, got {}",
                    json_kind(&item)
                )));
            }
            serde_json::from_value(item).map_err(|err| CanvasError::Malformed(err.to_string()))
        })
        .collect()
}

/// Pick the `rel="next"` target out of an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<Url> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

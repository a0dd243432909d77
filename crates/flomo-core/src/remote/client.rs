//! HTTP paginator for the flomo `memo/updated` endpoint.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use md5::{Digest, Md5};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{html_to_text, RemotePage, RemotePaginator};
use crate::error::{Error, Result};
use crate::models::{Note, SyncCursor};
use crate::util::{compact_text, is_http_url, normalize_text_option, unix_timestamp_now};

pub const DEFAULT_API_BASE_URL: &str = "https://flomoapp.com";
pub const DEFAULT_PAGE_SIZE: usize = 200;
const UPDATED_PATH: &str = "/api/v1/memo/updated/";
const MEMO_LINK_BASE: &str = "https://v.flomoapp.com/mine/?memo_id=";
const SIGN_SALT: &str = "dbbc3dd73364b4084c3a69346e0ce2b2";
const API_KEY: &str = "flomo_web";
const APP_VERSION: &str = "5.25.64";
const PLATFORM: &str = "mac";
const REMOTE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Connection settings for [`FlomoClient`]
#[derive(Clone)]
pub struct RemoteConfig {
    /// Service origin, without trailing slash
    pub base_url: String,
    /// Authorization header value, always `Bearer ...`
    pub token: String,
    /// Notes requested per page
    pub page_size: usize,
    /// Zone the remote's naive timestamps are written in
    pub timezone: FixedOffset,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Config against the public service with default paging
    pub fn new(token: &str) -> Result<Self> {
        Ok(Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: normalize_token(token)?,
            page_size: DEFAULT_PAGE_SIZE,
            timezone: default_timezone(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Point at a different origin (self-hosted proxy, test server)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.to_string()))
            .ok_or_else(|| Error::Config("API base URL must not be empty".into()))?;
        if !is_http_url(&base_url) {
            return Err(Error::Config(
                "API base URL must include http:// or https://".into(),
            ));
        }
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Zone offset in whole hours east of UTC
    pub fn with_timezone_hours(mut self, hours: i32) -> Result<Self> {
        self.timezone = FixedOffset::east_opt(hours * 3600)
            .ok_or_else(|| Error::Config(format!("invalid timezone offset {hours}h")))?;
        Ok(self)
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `tz` request parameter, e.g. `8:0`
    fn tz_param(&self) -> String {
        let seconds = self.timezone.local_minus_utc();
        format!("{}:{}", seconds / 3600, (seconds % 3600).abs() / 60)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .field("timezone", &self.timezone)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn default_timezone() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Trim a user-supplied token and add the `Bearer ` scheme when missing.
pub fn normalize_token(raw: &str) -> Result<String> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(Error::Config("authorization token must not be empty".into()));
    }
    if token.starts_with("Bearer ") {
        Ok(token.to_string())
    } else {
        Ok(format!("Bearer {token}"))
    }
}

/// Parse a remote timestamp into Unix milliseconds.
///
/// Accepts RFC 3339, or the remote's naive `YYYY-MM-DD HH:MM:SS` read in
/// `timezone`.
pub fn parse_remote_timestamp(raw: &str, timezone: FixedOffset) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.timestamp_millis());
    }

    let naive = NaiveDateTime::parse_from_str(raw, REMOTE_TIMESTAMP_FORMAT).map_err(|error| {
        Error::RemoteUnavailable(format!("invalid timestamp '{raw}' in response: {error}"))
    })?;
    timezone
        .from_local_datetime(&naive)
        .single()
        .map(|date_time| date_time.timestamp_millis())
        .ok_or_else(|| Error::RemoteUnavailable(format!("ambiguous timestamp '{raw}'")))
}

/// Paginator over the flomo web API
#[derive(Clone)]
pub struct FlomoClient {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl FlomoClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { config, client })
    }

    /// Query parameters for the page after `cursor`, including the signature.
    fn signed_params(&self, cursor: Option<&SyncCursor>, now_secs: i64) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("limit".to_string(), self.config.page_size.to_string());
        params.insert("tz".to_string(), self.config.tz_param());
        params.insert("timestamp".to_string(), now_secs.to_string());
        params.insert("api_key".to_string(), API_KEY.to_string());
        params.insert("app_version".to_string(), APP_VERSION.to_string());
        params.insert("platform".to_string(), PLATFORM.to_string());
        params.insert("webp".to_string(), "1".to_string());

        if let Some(cursor) = cursor {
            params.insert("latest_slug".to_string(), cursor.id.to_string());
            params.insert(
                "latest_updated_at".to_string(),
                cursor.updated_at_secs().to_string(),
            );
        }

        let sign = sign_params(&params);
        params.insert("sign".to_string(), sign);
        params
    }

    /// Turn one decoded response into a page.
    ///
    /// A short page is the last one; a full page continues after its last note.
    fn parse_page(&self, memos: Vec<ApiMemo>) -> Result<RemotePage> {
        let full_page = memos.len() >= self.config.page_size;
        let notes = memos
            .into_iter()
            .map(|memo| memo.into_note(self.config.timezone))
            .collect::<Result<Vec<_>>>()?;

        let next_cursor = if full_page {
            notes.last().map(SyncCursor::after)
        } else {
            None
        };

        Ok(RemotePage { notes, next_cursor })
    }
}

impl fmt::Debug for FlomoClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FlomoClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemotePaginator for FlomoClient {
    async fn next_page(&self, cursor: Option<&SyncCursor>) -> Result<RemotePage> {
        let params = self.signed_params(cursor, unix_timestamp_now());
        let url = format!("{}{UPDATED_PATH}", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.config.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|error| Error::RemoteUnavailable(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Error::RemoteUnavailable(format!("failed to read response: {error}")))?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(Error::Unauthorized(format!(
                "HTTP {}: {}",
                status.as_u16(),
                compact_text(&body)
            )));
        }
        if !status.is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                compact_text(&body)
            )));
        }

        let memos = decode_response(&body)?;
        let page = self.parse_page(memos)?;
        tracing::debug!(
            "Fetched page of {} memos (last page: {})",
            page.notes.len(),
            page.is_last()
        );
        Ok(page)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<ApiMemo>>,
}

#[derive(Debug, Deserialize)]
struct ApiMemo {
    slug: String,
    content: String,
    created_at: String,
    updated_at: String,
    #[serde(default)]
    tags: Vec<String>,
}

impl ApiMemo {
    fn into_note(self, timezone: FixedOffset) -> Result<Note> {
        let created_at = parse_remote_timestamp(&self.created_at, timezone)?;
        let updated_at = parse_remote_timestamp(&self.updated_at, timezone)?;
        let url = format!("{MEMO_LINK_BASE}{}", self.slug);

        Ok(
            Note::new(self.slug, html_to_text(&self.content), created_at, updated_at)
                .with_tags(self.tags)
                .with_url(url),
        )
    }
}

/// Decode the JSON envelope; non-zero codes are API errors.
fn decode_response(body: &str) -> Result<Vec<ApiMemo>> {
    let response: ApiResponse = serde_json::from_str(body).map_err(|error| {
        Error::RemoteUnavailable(format!(
            "invalid response JSON: {error} ({})",
            compact_text(body)
        ))
    })?;

    if response.code != 0 {
        let message = response
            .message
            .and_then(|message| normalize_text_option(Some(message)))
            .unwrap_or_else(|| "no message".to_string());
        let detail = format!("API error code {}: {message}", response.code);
        return if is_auth_failure(response.code, &message) {
            Err(Error::Unauthorized(detail))
        } else {
            Err(Error::RemoteUnavailable(detail))
        };
    }

    Ok(response.data.unwrap_or_default())
}

fn is_auth_failure(code: i64, message: &str) -> bool {
    let message = message.to_lowercase();
    code == -10
        || message.contains("登录")
        || message.contains("login")
        || message.contains("token")
        || message.contains("unauthor")
}

/// Lowercase hex MD5 over `k=v&k=v...` in key order followed by the salt.
fn sign_params(params: &BTreeMap<String, String>) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Md5::new();
    hasher.update(joined.as_bytes());
    hasher.update(SIGN_SALT.as_bytes());
    format!("{:x}", hasher.finalize())
}

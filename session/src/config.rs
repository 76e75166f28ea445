//! Session configuration parsed from environment variables and launch
//! query parameters.

use canvas::consts::DEFAULT_CANVAS_SIZE;
use canvas::coords::{CoordMapper, PlotMargin};

use crate::error::SessionError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

// =============================================================================
// REMOTE SERVICE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Service root without a trailing slash.
    pub base_url: String,
    pub timeouts: ApiTimeouts,
}

impl SessionConfig {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), timeouts: ApiTimeouts::default() }
    }

    /// Build typed session config from environment variables.
    ///
    /// Optional:
    /// - `FLOWGATE_BASE_URL`: default `http://127.0.0.1:8080`
    /// - `FLOWGATE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `FLOWGATE_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] over an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(&var("FLOWGATE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()));
        config.timeouts = ApiTimeouts {
            request_secs: parse_or(var("FLOWGATE_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(var("FLOWGATE_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        config
    }

    /// Background plot image URL for a plot key and cache-busting version.
    #[must_use]
    pub fn plot_url(&self, plot_key: &str, version: u64) -> String {
        format!("{}/expFile/renderGatePlot?plotKey={plot_key}&v={version}", self.base_url)
    }
}

// =============================================================================
// CANVAS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: DEFAULT_CANVAS_SIZE, height: DEFAULT_CANVAS_SIZE }
    }
}

impl CanvasConfig {
    /// - `FLOWGATE_CANVAS_WIDTH`, `FLOWGATE_CANVAS_HEIGHT`: default 900
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            width: env_parse("FLOWGATE_CANVAS_WIDTH", DEFAULT_CANVAS_SIZE),
            height: env_parse("FLOWGATE_CANVAS_HEIGHT", DEFAULT_CANVAS_SIZE),
        }
    }

    #[must_use]
    pub fn mapper(&self, margin: PlotMargin) -> CoordMapper {
        CoordMapper::new(self.width, self.height, margin)
    }
}

// =============================================================================
// LAUNCH PARAMETERS
// =============================================================================

/// Which gate tree to open, as passed to the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub exp_file_id: String,
    pub gate_edit_session: String,
    /// Start from a fresh tree even if one is saved.
    pub new_gate: bool,
}

impl LaunchParams {
    /// Parse `expFileId`, `gateEditSession` and `newGate` from a URL query
    /// string, with or without the leading `?`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if `expFileId` is missing or empty.
    pub fn from_query(query: &str) -> Result<Self, SessionError> {
        let url = reqwest::Url::parse(&format!("http://launch.invalid/?{}", query.trim_start_matches('?')))
            .map_err(|e| SessionError::Config(format!("bad launch query: {e}")))?;

        let mut params = Self { exp_file_id: String::new(), gate_edit_session: String::new(), new_gate: false };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "expFileId" => params.exp_file_id = value.into_owned(),
                "gateEditSession" => params.gate_edit_session = value.into_owned(),
                "newGate" => params.new_gate = parse_flag(&value),
                _ => {}
            }
        }

        if params.exp_file_id.is_empty() {
            return Err(SessionError::Config("launch query is missing expFileId".into()));
        }
        Ok(params)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    parse_or(std::env::var(key).ok(), default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

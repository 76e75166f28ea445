//! Remote flowgate service client.
//!
//! Thin HTTP wrapper for the two endpoints the editor needs: loading an
//! experiment file with its gate tree, and saving the tree while asking the
//! server to re-render the background plot. Pure parsing lives in
//! `parse_exp_file` for testability; [`GateApi`] is the seam tests mock.

use std::collections::HashMap;
use std::time::Duration;

use canvas::coords::PlotMargin;
use gates::{Transform, TransformType};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::SessionConfig;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by remote service calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request could not be sent or its body not read.
    #[error("API request failed: {0}")]
    Request(String),

    /// The service returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    Response { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Whether a caller-side retry could plausibly succeed. The session
    /// itself never retries.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Experiment file metadata with its saved gate tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpFile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub gate: Option<SavedGate>,
    pub channels: Vec<Channel>,
    pub plot_margin: PlotMargin,
    pub predefined_transforms: Vec<ExpFileTransform>,
    pub default_transforms: Vec<ExpFileTransform>,
    pub auto_transforms: Vec<ExpFileTransform>,
    pub gate_edit_session: String,
}

/// A stored gate tree. `gateJson` is usually a JSON-encoded string but an
/// inline object is accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedGate {
    pub id: serde_json::Value,
    pub gate_json: serde_json::Value,
}

impl SavedGate {
    /// The gate tree as a JSON value, or `None` when nothing usable is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Parse`] when a string payload is not valid JSON.
    pub fn tree_value(&self) -> Result<Option<serde_json::Value>, ApiError> {
        match &self.gate_json {
            serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(None),
            serde_json::Value::String(raw) => {
                serde_json::from_str(raw).map(Some).map_err(|e| ApiError::Parse(e.to_string()))
            }
            serde_json::Value::Object(_) => Ok(Some(self.gate_json.clone())),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Channel {
    pub short_name: String,
    pub name: String,
    pub id: serde_json::Value,
    pub range: serde_json::Value,
}

/// A per-channel transform offered by the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpFileTransform {
    pub channel: String,
    pub transform_name: String,
    pub transform_type: Option<String>,
    pub is_predefined: bool,
    pub parameter_values: HashMap<String, f64>,
}

impl ExpFileTransform {
    /// Typed transform. Entries with no type or flagged as predefined map to
    /// a predefined transform named after `transformName`.
    #[must_use]
    pub fn to_transform(&self) -> Transform {
        let transform_type = match self.transform_type.as_deref() {
            Some(raw) if !raw.is_empty() && !self.is_predefined => TransformType::parse(raw),
            _ => TransformType::Predefined,
        };
        let value = |k: &str| self.parameter_values.get(k).copied().unwrap_or(0.0);
        Transform {
            transform_type,
            a: value("a"),
            t: value("t"),
            m: value("m"),
            w: value("w"),
            predefined_name: self.transform_name.clone(),
        }
    }
}

/// Body of the save-and-render request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotUpdateRequest {
    pub exp_file: String,
    pub gate_edit_session: String,
    pub gates: serde_json::Value,
}

/// Save-and-render response. Only the plot key is used, and only if present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlotUpdate {
    pub plot_key: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

// =============================================================================
// TRAIT
// =============================================================================

/// Remote gate-tree service. Enables mocking in tests.
#[async_trait::async_trait]
pub trait GateApi: Send + Sync {
    /// Load experiment-file metadata and its gate tree.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport, status or parse failure.
    async fn fetch_exp_file(&self, exp_file_id: &str, gate_edit_session: &str) -> Result<ExpFile, ApiError>;

    /// Save the gate tree and re-render its plot.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport, status or parse failure.
    async fn update_gate_plot(&self, request: &PlotUpdateRequest) -> Result<PlotUpdate, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpGateApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateApi {
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &SessionConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }

    async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Response { status, body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl GateApi for HttpGateApi {
    async fn fetch_exp_file(&self, exp_file_id: &str, gate_edit_session: &str) -> Result<ExpFile, ApiError> {
        let url = format!("{}/expFile/renderFcsInfoWithGateTree/{exp_file_id}", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("gateEditSession", gate_edit_session)])
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        parse_exp_file(&Self::read_body(response).await?)
    }

    async fn update_gate_plot(&self, request: &PlotUpdateRequest) -> Result<PlotUpdate, ApiError> {
        let url = format!("{}/expFile/updateGatePlot", self.base_url);
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        parse_plot_update(&Self::read_body(response).await?)
    }
}

// =============================================================================
// PARSING
// =============================================================================

pub(crate) fn parse_exp_file(json: &str) -> Result<ExpFile, ApiError> {
    serde_json::from_str(json).map_err(|e| ApiError::Parse(e.to_string()))
}

/// An empty or non-object body is a success with no plot key.
pub(crate) fn parse_plot_update(json: &str) -> Result<PlotUpdate, ApiError> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value @ serde_json::Value::Object(_)) => {
            serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
        }
        _ => Ok(PlotUpdate::default()),
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

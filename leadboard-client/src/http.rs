/// `LeadApi` over the CRM's REST endpoints.
use async_trait::async_trait;
use leadboard_core::api::{ApiError, LeadApi, MoveLeadRequest};
use leadboard_core::cancel::CancelToken;
use leadboard_core::search::SearchRequest;
use leadboard_core::types::{ActivityCounts, ActivityCountsMap, Board, LeadId, MoveResponse};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::ClientError;

/// Everything except unreserved characters is escaped in path segments.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Serialize)]
struct BulkCountsRequest<'a> {
    lead_ids: &'a [LeadId],
}

#[derive(Clone)]
pub struct HttpLeadApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLeadApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(build_headers(config)?)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(network_error)?;
        parse_response(response).await
    }
}

fn build_headers(config: &ClientConfig) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    if let Some(account_id) = &config.account_id {
        headers.insert(
            HeaderName::from_static("x-account-id"),
            HeaderValue::from_str(account_id)
                .map_err(|e| ClientError::Config(format!("account_id: {}", e)))?,
        );
    }
    if let Some(token) = &config.api_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::Config(format!("api_token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

fn network_error(e: reqwest::Error) -> ApiError {
    log::warn!(target: "leadboard.http", "Request failed: {}", e);
    ApiError::Network(e.to_string())
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        log::warn!(target: "leadboard.http", "Server replied {}: {}", status.as_u16(), message);
        return Err(ApiError::from_status(status.as_u16(), message));
    }
    let bytes = response.bytes().await.map_err(network_error)?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pull a message out of `{"error": ..}` / `{"message": ..}` bodies, falling
/// back to the raw text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }
    Some(body.to_string())
}

#[async_trait]
impl LeadApi for HttpLeadApi {
    async fn fetch_board(&self) -> Result<Board, ApiError> {
        self.send(self.client.get(self.url("/board"))).await
    }

    async fn move_lead(
        &self,
        lead_id: &str,
        request: &MoveLeadRequest,
    ) -> Result<MoveResponse, ApiError> {
        let path = format!("/leads/{}/move", encode_segment(lead_id));
        self.send(self.client.patch(self.url(&path)).json(request))
            .await
    }

    async fn search_board(
        &self,
        request: &SearchRequest,
        cancel: CancelToken,
    ) -> Result<Board, ApiError> {
        let call = self.send(self.client.post(self.url("/board/search")).json(request));
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!(target: "leadboard.http", "Board search aborted");
                Err(ApiError::Aborted)
            }
            result = call => result,
        }
    }

    async fn activity_counts(&self, lead_id: &str) -> Result<ActivityCounts, ApiError> {
        let path = format!("/leads/{}/activity-counts", encode_segment(lead_id));
        self.send(self.client.get(self.url(&path))).await
    }

    async fn activity_counts_bulk(
        &self,
        lead_ids: &[LeadId],
    ) -> Result<ActivityCountsMap, ApiError> {
        if lead_ids.is_empty() {
            return Ok(ActivityCountsMap::new());
        }
        let body = BulkCountsRequest { lead_ids };
        self.send(
            self.client
                .post(self.url("/leads/activity-counts"))
                .json(&body),
        )
        .await
    }
}

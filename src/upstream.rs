use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::{ResponseCache, make_cache_key};
use crate::error::UpstreamError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::models::{
    ChatMessage, ChatRequest, ChatResponse, ExecuteQueryRequest, ExecuteQueryResponse,
    QueryResults, QueryStatus, RankingAgent, RankingEnvelope, UpstreamErrorBody,
};

// Analytics queries are polled at most 30 times, 2s apart (about a minute)
const QUERY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const QUERY_MAX_POLLS: u32 = 30;

const STATE_COMPLETED: &str = "QUERY_STATE_COMPLETED";
const STATE_FAILED: &str = "QUERY_STATE_FAILED";

// Client for the leaderboard API, the LLM and the analytics API
pub struct Upstream {
    client: reqwest::Client,
    ranking_url: String,
    llm_url: String,
    llm_model: String,
    llm_token: Option<String>,
    analytics_url: String,
    analytics_key: Option<String>,
    cache: ResponseCache,
}

impl Upstream {
    pub fn new(
        client: reqwest::Client,
        ranking_url: String,
        ranking_ttl: Duration,
        llm_url: String,
        llm_model: String,
        llm_token: Option<String>,
    ) -> Self {
        Self {
            client,
            ranking_url,
            llm_url,
            llm_model,
            llm_token: llm_token.filter(|t| !t.trim().is_empty()),
            analytics_url: String::new(),
            analytics_key: None,
            cache: ResponseCache::new(ranking_ttl),
        }
    }

    pub fn with_analytics(mut self, base_url: String, key: Option<String>) -> Self {
        self.analytics_url = base_url.trim_end_matches('/').to_string();
        self.analytics_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn has_llm(&self) -> bool {
        self.llm_token.is_some()
    }

    pub fn has_analytics(&self) -> bool {
        self.analytics_key.is_some()
    }

    // Leaderboard rows, served from cache while fresh
    pub async fn fetch_ranking(&self) -> Result<Vec<RankingAgent>, UpstreamError> {
        let key = make_cache_key("ranking", &self.ranking_url);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(agents) = serde_json::from_str(&cached) {
                debug!("ranking cache hit");
                return Ok(agents);
            }
        }

        let start = Instant::now();
        let res = self.client.get(&self.ranking_url).send().await?;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());

        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: format!("ranking API returned {status}"),
            });
        }

        let agents = res.json::<RankingEnvelope>().await?.data.unwrap_or_default();
        if let Ok(json) = serde_json::to_string(&agents) {
            self.cache.insert(key, json);
        }
        info!(agents = agents.len(), "fetched ranking");
        Ok(agents)
    }

    // Single-turn chat completion; returns the first choice's text
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, UpstreamError> {
        let token = self.llm_token.as_deref().ok_or(UpstreamError::MissingToken)?;
        let body = ChatRequest {
            model: &self.llm_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
            max_tokens,
        };

        let start = Instant::now();
        let res = self
            .client
            .post(&self.llm_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<UpstreamErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("LLM API error ({status})"));
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let completion = res.json::<ChatResponse>().await?;
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    // Execute `sql`, poll until it finishes, then fetch its rows
    pub async fn run_query<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, UpstreamError> {
        let key = self
            .analytics_key
            .as_deref()
            .ok_or(UpstreamError::MissingAnalyticsKey)?;
        let start = Instant::now();

        let res = self
            .client
            .post(format!("{}/sql/execute", self.analytics_url))
            .header("X-DUNE-API-KEY", key)
            .json(&ExecuteQueryRequest { query_sql: sql })
            .send()
            .await?;
        let status = res.status();
        let body = res.json::<ExecuteQueryResponse>().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: error_text(body.error.as_ref())
                    .unwrap_or_else(|| format!("analytics execute failed ({status})")),
            });
        }
        let execution_id = body
            .execution_id
            .ok_or_else(|| UpstreamError::QueryFailed("no execution_id".to_string()))?;
        debug!(%execution_id, "analytics query submitted");

        for _ in 0..QUERY_MAX_POLLS {
            tokio::time::sleep(QUERY_POLL_INTERVAL).await;

            let status = self
                .client
                .get(format!("{}/execution/{execution_id}/status", self.analytics_url))
                .header("X-DUNE-API-KEY", key)
                .send()
                .await?
                .json::<QueryStatus>()
                .await?;

            let state = status.state.as_deref();
            if state == Some(STATE_COMPLETED) || status.is_execution_finished == Some(true) {
                let results = self
                    .client
                    .get(format!("{}/execution/{execution_id}/results", self.analytics_url))
                    .header("X-DUNE-API-KEY", key)
                    .send()
                    .await?
                    .json::<QueryResults<T>>()
                    .await?;
                UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());
                return Ok(results.result.map(|r| r.rows).unwrap_or_default());
            }
            if state == Some(STATE_FAILED) || status.error.is_some() {
                return Err(UpstreamError::QueryFailed(
                    error_text(status.error.as_ref()).unwrap_or_else(|| "query failed".to_string()),
                ));
            }
        }

        warn!(%execution_id, "analytics query did not finish in time");
        Err(UpstreamError::QueryTimeout)
    }
}

// Error payloads come as either a string or {"message": ...}
fn error_text(error: Option<&serde_json::Value>) -> Option<String> {
    let error = error?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(|m| m.as_str()))
        .map(str::to_string)
        .or_else(|| (!error.is_null()).then(|| error.to_string()))
}

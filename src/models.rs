use serde::{Deserialize, Serialize};

// One agent row from the leaderboard ranking API
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingAgent {
    pub agent_id: serde_json::Value,
    pub agent_name: String,
    pub rank: Option<u32>,
    pub total_revenue: Option<f64>,
    pub success_rate: Option<f64>,
    pub successful_job_count: Option<u64>,
    pub unique_buyer_count: Option<u64>,
    pub rating: Option<f64>,
    pub category: Option<String>,
    pub role: Option<String>,
    pub prize_pool_percentage: Option<f64>,
    pub has_graduated: Option<bool>,
    pub token_address: Option<String>,
    pub profile_pic: Option<String>,
    pub twitter_handle: Option<String>,
}

// Upstream envelope: {"data": [...]}
#[derive(Deserialize)]
pub struct RankingEnvelope {
    #[serde(default)]
    pub data: Option<Vec<RankingAgent>>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Ecosystem,
    Gap,
    Idea,
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub result: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct TranslateResponse {
    pub result: String,
}

// OpenAI-style chat completion request
#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Deserialize, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// {"error": {"message": "..."}} as returned by OpenAI-compatible APIs
#[derive(Deserialize)]
pub struct UpstreamErrorBody {
    pub error: Option<UpstreamErrorDetail>,
}

#[derive(Deserialize)]
pub struct UpstreamErrorDetail {
    pub message: Option<String>,
}

// Analytics (Dune) query execution wire types
#[derive(Serialize)]
pub struct ExecuteQueryRequest<'a> {
    pub query_sql: &'a str,
}

#[derive(Deserialize)]
pub struct ExecuteQueryResponse {
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct QueryStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub is_execution_finished: Option<bool>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct QueryResults<T> {
    #[serde(default)]
    pub result: Option<QueryRows<T>>,
}

#[derive(Deserialize)]
pub struct QueryRows<T> {
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
}

use crate::guard::ApiGuard;
use crate::upstream::Upstream;

// app's shared state
pub struct AppState {
    pub guard: ApiGuard,    // admission pipeline for expensive routes
    pub upstream: Upstream, // leaderboard + LLM client
}

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::RankingAgent;

const UNCATEGORIZED: &str = "NONE";

// Opportunity figures for one agent category
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: String,
    pub agent_count: usize,
    pub total_revenue: f64,
    pub avg_revenue: f64,
    pub avg_success_rate: f64,
    pub avg_buyers: f64,
    pub total_buyers: u64,
    pub avg_rating: f64,
    pub top_agent: String,
    // higher = more opportunity
    pub gap_score: f64,
    pub revenue_per_agent: f64,
    pub competition_index: f64,
    pub demand_index: f64,
    pub signals: Vec<&'static str>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GapMeta {
    pub total_agents: usize,
    pub total_revenue: f64,
    pub total_buyers: u64,
    pub avg_revenue_global: f64,
    pub avg_buyers_global: f64,
    pub updated_at: String,
}

#[derive(Serialize, Debug)]
pub struct GapReport {
    pub categories: Vec<CategoryScore>,
    pub meta: GapMeta,
}

#[derive(Default)]
struct Totals {
    count: usize,
    revenue: f64,
    success_sum: f64,
    buyers_sum: u64,
    rating_sum: f64,
    top_revenue: f64,
    top_agent: String,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// Demand vs competition per category; None for an empty ranking
pub fn compute(agents: &[RankingAgent]) -> Option<GapReport> {
    if agents.is_empty() {
        return None;
    }

    let mut by_category: HashMap<&str, Totals> = HashMap::new();
    for agent in agents {
        let category = agent
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED);
        let revenue = agent.total_revenue.unwrap_or(0.0);

        let t = by_category.entry(category).or_default();
        t.count += 1;
        t.revenue += revenue;
        t.success_sum += agent.success_rate.unwrap_or(0.0);
        t.buyers_sum += agent.unique_buyer_count.unwrap_or(0);
        t.rating_sum += agent.rating.unwrap_or(0.0);
        if revenue > t.top_revenue {
            t.top_revenue = revenue;
            t.top_agent = agent.agent_name.clone();
        }
    }

    let total_agents = agents.len();
    let total_revenue: f64 = agents.iter().map(|a| a.total_revenue.unwrap_or(0.0)).sum();
    let total_buyers: u64 = agents.iter().map(|a| a.unique_buyer_count.unwrap_or(0)).sum();
    let avg_revenue_global = total_revenue / total_agents as f64;
    let avg_buyers_global = total_buyers as f64 / total_agents as f64;

    let mut categories: Vec<CategoryScore> = by_category
        .into_iter()
        .filter(|(category, _)| *category != UNCATEGORIZED)
        .map(|(category, t)| {
            let n = t.count as f64;
            let avg_revenue = t.revenue / n;
            let avg_success = t.success_sum / n;
            let avg_buyers = t.buyers_sum as f64 / n;
            let avg_rating = t.rating_sum / n;

            // how crowded the category is, 0-100
            let competition = (n / total_agents as f64 * 300.0).min(100.0);
            // buyer density and revenue relative to the whole board, 0-100
            let buyer_ratio = avg_buyers / avg_buyers_global.max(1.0);
            let revenue_ratio = avg_revenue / avg_revenue_global.max(1.0);
            let demand = ((buyer_ratio + revenue_ratio) / 2.0 * 50.0).min(100.0);

            let success_bonus = if avg_success > 50.0 {
                1.2
            } else if avg_success > 30.0 {
                1.0
            } else {
                0.8
            };
            let gap_score = round2(demand / competition.max(5.0) * success_bonus);

            let signals = signals(SignalInput {
                demand,
                competition,
                avg_revenue,
                avg_revenue_global,
                avg_buyers,
                avg_buyers_global,
                avg_success,
                count: t.count,
            });

            CategoryScore {
                category: category.to_string(),
                agent_count: t.count,
                total_revenue: round1(t.revenue),
                avg_revenue: round1(avg_revenue),
                avg_success_rate: round1(avg_success),
                avg_buyers: round1(avg_buyers),
                total_buyers: t.buyers_sum,
                avg_rating: round1(avg_rating),
                top_agent: t.top_agent,
                gap_score,
                revenue_per_agent: round1(avg_revenue),
                competition_index: round1(competition),
                demand_index: round1(demand),
                signals,
            }
        })
        .collect();

    // ties broken by name so output doesn't depend on hash order
    categories.sort_by(|a, b| {
        b.gap_score
            .total_cmp(&a.gap_score)
            .then_with(|| a.category.cmp(&b.category))
    });

    Some(GapReport {
        categories,
        meta: GapMeta {
            total_agents,
            total_revenue: round1(total_revenue),
            total_buyers,
            avg_revenue_global: round1(avg_revenue_global),
            avg_buyers_global: round1(avg_buyers_global),
            updated_at: Utc::now().to_rfc3339(),
        },
    })
}

struct SignalInput {
    demand: f64,
    competition: f64,
    avg_revenue: f64,
    avg_revenue_global: f64,
    avg_buyers: f64,
    avg_buyers_global: f64,
    avg_success: f64,
    count: usize,
}

fn signals(s: SignalInput) -> Vec<&'static str> {
    let mut out = Vec::new();
    if s.demand > 60.0 && s.competition < 30.0 {
        out.push("high demand, low competition: top opportunity");
    } else if s.demand > 40.0 && s.competition < 40.0 {
        out.push("healthy opportunity: competition proportionate to demand");
    }
    if s.avg_revenue > s.avg_revenue_global * 1.5 {
        out.push("top revenue per agent: proven profitability");
    }
    if s.avg_buyers > s.avg_buyers_global * 1.5 {
        out.push("dense buyer base: active users");
    }
    if s.count < 10 {
        out.push("early-stage category: room to move first");
    }
    if s.competition > 60.0 {
        out.push("overcrowded: differentiation required");
    }
    if s.avg_success < 30.0 {
        out.push("low average success rate: enter with care");
    }
    if s.avg_success > 60.0 {
        out.push("high success rate: demand validated");
    }
    out
}

use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{InsightKind, RankingAgent};

pub const ANALYST_SYSTEM_PROMPT: &str =
    "You are an expert analyst of AI agent ecosystems. Answer concisely and back claims with the data.";

pub const TRANSLATE_SYSTEM_PROMPT: &str = "Translate the English text into natural Korean. Output only the translation, \
     with no explanations or notes. Keep proper nouns such as project and token names in the original.";

// Below this many chars a text isn't worth a translation call
const MIN_TRANSLATE_CHARS: usize = 10;

impl InsightKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ecosystem" => Some(InsightKind::Ecosystem),
            "gap" => Some(InsightKind::Gap),
            "idea" => Some(InsightKind::Idea),
            _ => None,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            InsightKind::Ecosystem => {
                "Below is ranking data for AI agents on the leaderboard. Analyse the state of the \
                 ecosystem: revenue distribution, trends per category, what successful agents have \
                 in common, and weak spots or opportunities."
            }
            InsightKind::Gap => {
                "Using the data below, find the gaps in the ecosystem: areas with high demand but \
                 little supply, profitable categories with little competition, and kinds of agents \
                 that don't exist yet."
            }
            InsightKind::Idea => {
                "Based on the data below, propose 5 new agent ideas. Answer only with a JSON array \
                 of objects with the keys name, category, feature, target, revenue, \
                 differentiator, difficulty (high|medium|low) and pitch. Output the JSON array and \
                 nothing else."
            }
        }
    }
}

#[derive(Default)]
struct CategoryStats {
    count: usize,
    revenue: f64,
    success_sum: f64,
    buyers: u64,
}

// Plain-text digest of the ranking fed to the LLM: category stats + top 20
pub fn summarize(agents: &[RankingAgent]) -> String {
    let mut stats: HashMap<&str, CategoryStats> = HashMap::new();
    for a in agents {
        let category = a
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or("UNKNOWN");
        let s = stats.entry(category).or_default();
        s.count += 1;
        s.revenue += a.total_revenue.unwrap_or(0.0);
        s.success_sum += a.success_rate.unwrap_or(0.0);
        s.buyers += a.unique_buyer_count.unwrap_or(0);
    }

    let mut categories: Vec<_> = stats.into_iter().collect();
    categories.sort_by(|a, b| b.1.revenue.total_cmp(&a.1.revenue));

    let mut out = String::from("## Summary by category\n");
    for (category, s) in &categories {
        let avg_success = s.success_sum / s.count as f64;
        let _ = writeln!(
            out,
            "- {category}: {} agents, total revenue {:.1}, avg success rate {avg_success:.1}%, total buyers {}",
            s.count, s.revenue, s.buyers
        );
    }

    out.push_str("\n## Top 20 agents\n");
    for a in agents.iter().take(20) {
        let _ = writeln!(
            out,
            "{}. {} - revenue: {:.1}, success rate: {:.1}%, buyers: {}, category: {}, role: {}",
            a.rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
            a.agent_name,
            a.total_revenue.unwrap_or(0.0),
            a.success_rate.unwrap_or(0.0),
            a.unique_buyer_count.unwrap_or(0),
            a.category.as_deref().unwrap_or("-"),
            a.role.as_deref().unwrap_or("-"),
        );
    }

    let _ = writeln!(out, "\nTotal agents: {}", agents.len());
    out
}

// Short or already-Korean text goes back untranslated
pub fn needs_translation(text: &str) -> bool {
    if text.chars().count() < MIN_TRANSLATE_CHARS {
        return false;
    }
    !text.chars().all(|c| {
        ('\u{AC00}'..='\u{D7A3}').contains(&c)
            || c.is_whitespace()
            || c.is_ascii_digit()
            || matches!(c, '.' | ',' | '!' | '?')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insight_kinds() {
        assert_eq!(InsightKind::parse("gap"), Some(InsightKind::Gap));
        assert_eq!(InsightKind::parse("idea"), Some(InsightKind::Idea));
        assert_eq!(InsightKind::parse("Gap"), None);
        assert_eq!(InsightKind::parse(""), None);
    }

    #[test]
    fn summary_orders_categories_by_revenue() {
        let agents = vec![
            RankingAgent {
                agent_name: "Alpha".into(),
                rank: Some(1),
                category: Some("GAMING".into()),
                total_revenue: Some(5.0),
                ..Default::default()
            },
            RankingAgent {
                agent_name: "Beta".into(),
                rank: Some(2),
                category: Some("DEFI".into()),
                total_revenue: Some(50.0),
                success_rate: Some(75.0),
                ..Default::default()
            },
        ];
        let s = summarize(&agents);
        let defi = s.find("- DEFI: 1 agents, total revenue 50.0, avg success rate 75.0%").unwrap();
        let gaming = s.find("- GAMING").unwrap();
        assert!(defi < gaming);
        assert!(s.contains("1. Alpha - revenue: 5.0"));
        assert!(s.ends_with("Total agents: 2\n"));
    }

    #[test]
    fn skips_short_and_korean_text() {
        assert!(!needs_translation("hi there"));
        assert!(!needs_translation("안녕하세요. 반갑습니다, 123!"));
        assert!(needs_translation("An agent that trades memecoins."));
    }
}

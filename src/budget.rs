use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::clock::Clock;

// Daily usage for one endpoint
#[derive(Debug, Clone, Copy)]
pub struct BudgetEntry {
    pub date: NaiveDate,
    pub count: u64,
}

// Global per-endpoint ceiling on calls per UTC day, shared by all clients
pub struct DailyBudget {
    entries: DashMap<String, BudgetEntry>,
    clock: Arc<dyn Clock>,
}

impl DailyBudget {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    // Count one call against today's budget; false once the ceiling is reached
    pub fn try_consume(&self, endpoint: &str, max_per_day: u64) -> bool {
        let today = self.clock.today();
        let fresh = BudgetEntry { date: today, count: 1 };

        match self.entries.entry(endpoint.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.date != today {
                    *entry = fresh;
                    return true;
                }
                if entry.count >= max_per_day {
                    return false;
                }
                entry.count += 1;
                true
            }
        }
    }

    pub fn current_usage(&self, endpoint: &str) -> u64 {
        let today = self.clock.today();
        self.entries
            .get(endpoint)
            .filter(|e| e.date == today)
            .map(|e| e.count)
            .unwrap_or(0)
    }
}

use serde::{Deserialize, Serialize};

// VIRTUAL token transfers per day over the last 30 days
pub const DAILY_TRANSFERS_SQL: &str = "
SELECT
  date_trunc('day', evt_block_time) AS day,
  COUNT(*) AS transfers,
  COUNT(DISTINCT \"from\") AS unique_senders,
  COUNT(DISTINCT \"to\") AS unique_receivers,
  SUM(CAST(value AS DOUBLE)) / 1e18 AS volume
FROM erc20_base.evt_Transfer
WHERE contract_address = 0x0b3e328455c4059EEb9e3f84b5543F74E24e7E1b
  AND evt_block_time >= NOW() - INTERVAL '30' DAY
GROUP BY 1
ORDER BY 1 ASC
";

// One result row of DAILY_TRANSFERS_SQL
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct DailyTransfers {
    pub day: String,
    pub transfers: u64,
    pub unique_senders: u64,
    pub unique_receivers: u64,
    pub volume: f64,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnchainSummary {
    pub total_volume: f64,
    pub total_transfers: u64,
    pub avg_daily_volume: f64,
    pub avg_daily_senders: f64,
    #[serde(rename = "volumeTrend7d")]
    pub volume_trend_7d: f64,
    #[serde(rename = "senderTrend7d")]
    pub sender_trend_7d: f64,
    pub days: usize,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OnchainReport {
    pub daily: Vec<DailyTransfers>,
    pub summary: OnchainSummary,
    pub updated_at: String,
}

// percent change of `last` over `prev`; 0 when there is no baseline
fn trend(last: f64, prev: f64) -> f64 {
    if prev > 0.0 {
        ((last - prev) / prev * 100.0 * 10.0).round() / 10.0
    } else {
        0.0
    }
}

// 30-day totals plus last 7 days vs the 7 before (rows oldest first)
pub fn summarize(daily: &[DailyTransfers]) -> OnchainSummary {
    let days = daily.len();
    let total_volume: f64 = daily.iter().map(|d| d.volume).sum();
    let total_transfers: u64 = daily.iter().map(|d| d.transfers).sum();
    let total_senders: u64 = daily.iter().map(|d| d.unique_senders).sum();
    let (avg_daily_volume, avg_daily_senders) = if days == 0 {
        (0.0, 0.0)
    } else {
        (total_volume / days as f64, total_senders as f64 / days as f64)
    };

    let last7 = &daily[days.saturating_sub(7)..];
    let prev7 = &daily[days.saturating_sub(14)..days.saturating_sub(7)];
    let volume = |rows: &[DailyTransfers]| rows.iter().map(|d| d.volume).sum::<f64>();
    let senders = |rows: &[DailyTransfers]| rows.iter().map(|d| d.unique_senders).sum::<u64>() as f64;

    OnchainSummary {
        total_volume: total_volume.round(),
        total_transfers,
        avg_daily_volume: avg_daily_volume.round(),
        avg_daily_senders: avg_daily_senders.round(),
        volume_trend_7d: trend(volume(last7), volume(prev7)),
        sender_trend_7d: trend(senders(last7), senders(prev7)),
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(i: usize, volume: f64, senders: u64) -> DailyTransfers {
        DailyTransfers {
            day: format!("2024-03-{:02} 00:00:00.000 UTC", i + 1),
            transfers: 10,
            unique_senders: senders,
            unique_receivers: senders,
            volume,
        }
    }

    #[test]
    fn empty_result_is_all_zero() {
        let s = summarize(&[]);
        assert_eq!(s.days, 0);
        assert_eq!(s.total_volume, 0.0);
        assert_eq!(s.avg_daily_senders, 0.0);
        assert_eq!(s.volume_trend_7d, 0.0);
    }

    #[test]
    fn compares_last_week_with_the_week_before() {
        // 16 days: 2 early days, then 7 at 100 volume / 4 senders, then 7 at 150 / 5
        let mut daily = vec![day(0, 1000.0, 50), day(1, 1000.0, 50)];
        daily.extend((2..9).map(|i| day(i, 100.0, 4)));
        daily.extend((9..16).map(|i| day(i, 150.0, 5)));

        let s = summarize(&daily);
        assert_eq!(s.days, 16);
        assert_eq!(s.total_transfers, 160);
        assert_eq!(s.total_volume, 3750.0);
        assert_eq!(s.avg_daily_volume, 234.0);
        assert_eq!(s.volume_trend_7d, 50.0);
        assert_eq!(s.sender_trend_7d, 25.0);
    }

    #[test]
    fn no_trend_without_a_previous_week() {
        let daily: Vec<_> = (0..5).map(|i| day(i, 10.0, 1)).collect();
        let s = summarize(&daily);
        assert_eq!(s.volume_trend_7d, 0.0);
        assert_eq!(s.sender_trend_7d, 0.0);
        assert_eq!(s.avg_daily_volume, 10.0);
    }

    #[test]
    fn rows_tolerate_missing_columns() {
        let row: DailyTransfers = serde_json::from_str(r#"{"day":"2024-03-01","transfers":3}"#).unwrap();
        assert_eq!(row.transfers, 3);
        assert_eq!(row.volume, 0.0);
    }
}

use chrono::Utc;

use crate::models::quote::{QuoteRecord, RawQuoteSources};
use crate::util::{round_or_none, to_finite};

/// Which price the day's gain is measured against. The two policies answer
/// different questions and are never mixed within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Change since the previous trading day's close.
    PreviousClose,
    /// Intraday change since the same day's open.
    SameDayOpen,
}

impl ReferencePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ReferencePolicy::PreviousClose => "previous-close",
            ReferencePolicy::SameDayOpen => "same-day-open",
        }
    }
}

/// Fallback used when no statement reports a diluted share count. Both
/// variants are assumptions about capital structure, so the factor is
/// carried as data rather than buried in the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DilutionPolicy {
    /// Assume diluted equals basic.
    EqualBasic,
    /// Assume diluted is basic inflated by a fixed factor.
    Inflated { factor: f64 },
}

pub const DEFAULT_DILUTION_FACTOR: f64 = 1.2;

impl DilutionPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            DilutionPolicy::EqualBasic => "equal-basic",
            DilutionPolicy::Inflated { .. } => "inflated",
        }
    }
}

// 利润表中稀释股本行项目的候选名称，机器风格名称优先
const DILUTED_SHARE_ITEMS: [&str; 6] = [
    "DilutedAverageShares",
    "Diluted Average Shares",
    "DilutedSharesOutstanding",
    "Diluted Shares Outstanding",
    "WeightedAverageDilutedSharesOutstanding",
    "Weighted Average Diluted Shares Outstanding",
];

/// Merges whichever raw views are present into one complete snapshot.
///
/// Never fails: an absent source or field collapses to null in the output,
/// and arithmetic whose preconditions are unmet (a missing operand, a zero
/// reference price) yields null rather than an error. Rounding happens only
/// here, at the output stage.
pub fn normalize(
    symbol: &str,
    sources: &RawQuoteSources,
    reference_policy: ReferencePolicy,
    dilution_policy: DilutionPolicy,
) -> QuoteRecord {
    let fast = sources.fast.clone().unwrap_or_default();
    let mut last_price = to_finite(fast.last_price);
    let mut prev_close = to_finite(fast.previous_close);
    let mut day_open = to_finite(fast.open);
    let mut market_cap = to_finite(fast.market_cap);
    let mut basic_shares = to_finite(fast.shares);

    // The 2-day window fills only the still-missing price fields.
    if let Some(bars) = &sources.history {
        if last_price.is_none() {
            last_price = bars.iter().rev().find_map(|b| to_finite(b.close));
        }
        if prev_close.is_none() {
            prev_close = bars.iter().rev().filter_map(|b| to_finite(b.close)).nth(1);
        }
        if day_open.is_none() {
            day_open = bars.iter().rev().find_map(|b| to_finite(b.open));
        }
    }

    if let Some(info) = &sources.info {
        if basic_shares.is_none() {
            basic_shares = to_finite(info.shares_outstanding).or(to_finite(info.float_shares));
        }
        if market_cap.is_none() {
            market_cap = to_finite(info.market_cap);
        }
    }

    // Last resort for market cap: shares times price.
    if market_cap.is_none() {
        market_cap = match (basic_shares, last_price) {
            (Some(shares), Some(price)) => Some(shares * price),
            _ => None,
        };
    }

    let mut diluted_shares = None;
    if let Some(statement) = &sources.income {
        'candidates: for name in DILUTED_SHARE_ITEMS {
            for row in &statement.rows {
                if row.name == name {
                    // Most recent non-null period wins.
                    if let Some(value) = row.periods.iter().find_map(|p| to_finite(*p)) {
                        diluted_shares = Some(value);
                        break 'candidates;
                    }
                }
            }
        }
    }

    let diluted_is_assumed = diluted_shares.is_none();
    if diluted_shares.is_none() {
        // The documented assumption, applied even when basic shares are
        // themselves unknown (null propagates).
        diluted_shares = match dilution_policy {
            DilutionPolicy::EqualBasic => basic_shares,
            DilutionPolicy::Inflated { factor } => basic_shares.map(|b| b * factor),
        };
    }

    let reference_price = match reference_policy {
        ReferencePolicy::PreviousClose => prev_close,
        ReferencePolicy::SameDayOpen => day_open,
    };

    let (day_gain, day_gain_pct) = match (last_price, reference_price) {
        (Some(last), Some(reference)) if reference != 0.0 => {
            let gain = last - reference;
            (Some(gain), Some(gain / reference * 100.0))
        }
        _ => (None, None),
    };

    // Dollar change in market cap, assuming the share count is constant
    // intraday; the percentage therefore matches the price percentage.
    let market_cap_day_gain = match (day_gain, basic_shares) {
        (Some(gain), Some(shares)) => Some(gain * shares),
        _ => None,
    };
    let market_cap_day_gain_pct = if market_cap_day_gain.is_some() {
        day_gain_pct
    } else {
        None
    };

    QuoteRecord {
        symbol: symbol.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        price: round_or_none(last_price, 4),
        day_gain: round_or_none(day_gain, 4),
        day_gain_pct: round_or_none(day_gain_pct, 4),
        market_cap: round_or_none(market_cap, 2),
        market_cap_day_gain: round_or_none(market_cap_day_gain, 2),
        market_cap_day_gain_pct: round_or_none(market_cap_day_gain_pct, 4),
        basic_shares_outstanding: round_or_none(basic_shares, 0),
        assumed_diluted_shares_outstanding: round_or_none(diluted_shares, 0),
        diluted_is_assumed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quote::{DailyBar, FastSnapshot, IncomeRow, IncomeStatement, InfoBundle};

    fn fast(last: Option<f64>, prev: Option<f64>) -> FastSnapshot {
        FastSnapshot {
            last_price: last,
            previous_close: prev,
            ..FastSnapshot::default()
        }
    }

    fn bars(pairs: &[(Option<f64>, Option<f64>)]) -> Vec<DailyBar> {
        pairs
            .iter()
            .map(|(open, close)| DailyBar {
                open: *open,
                close: *close,
            })
            .collect()
    }

    #[test]
    fn fast_snapshot_wins_over_history() {
        let sources = RawQuoteSources {
            fast: Some(fast(Some(10.0), Some(9.5))),
            // A contradicting window that must be ignored.
            history: Some(bars(&[(None, Some(1.0)), (None, Some(2.0))])),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.price, Some(10.0));
        assert_eq!(record.day_gain, Some(0.5));
        assert_eq!(record.day_gain_pct, Some(5.2632));
    }

    #[test]
    fn history_fills_missing_price_fields() {
        let sources = RawQuoteSources {
            fast: None,
            history: Some(bars(&[(None, Some(9.5)), (None, Some(10.0))])),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.price, Some(10.0));
        assert_eq!(record.day_gain, Some(0.5));
        assert_eq!(record.day_gain_pct, Some(5.2632));
    }

    #[test]
    fn history_fills_only_the_missing_side() {
        let sources = RawQuoteSources {
            fast: Some(fast(Some(11.0), None)),
            history: Some(bars(&[(None, Some(9.5)), (None, Some(10.0))])),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        // Last price kept from the snapshot, previous close from the window.
        assert_eq!(record.price, Some(11.0));
        assert_eq!(record.day_gain, Some(1.5));
    }

    #[test]
    fn null_closes_are_skipped_in_the_window() {
        let sources = RawQuoteSources {
            history: Some(bars(&[(None, Some(9.5)), (None, None), (None, Some(10.0))])),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.price, Some(10.0));
        assert_eq!(record.day_gain, Some(0.5));
    }

    #[test]
    fn zero_reference_yields_null_gains() {
        let sources = RawQuoteSources {
            fast: Some(fast(Some(10.0), Some(0.0))),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.price, Some(10.0));
        assert_eq!(record.day_gain, None);
        assert_eq!(record.day_gain_pct, None);
    }

    #[test]
    fn nan_inputs_are_treated_as_missing() {
        let sources = RawQuoteSources {
            fast: Some(fast(Some(f64::NAN), Some(9.5))),
            history: Some(bars(&[(None, Some(9.5)), (None, Some(10.0))])),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        // The NaN last price falls through to the window.
        assert_eq!(record.price, Some(10.0));
        assert_eq!(record.day_gain, Some(0.5));
    }

    #[test]
    fn market_cap_gain_is_price_gain_times_basic_shares() {
        let sources = RawQuoteSources {
            fast: Some(FastSnapshot {
                last_price: Some(10.0),
                previous_close: Some(9.5),
                shares: Some(1_000_000.0),
                ..FastSnapshot::default()
            }),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.market_cap_day_gain, Some(500_000.0));
        // Percent change of market cap matches the price percent change.
        assert_eq!(record.market_cap_day_gain_pct, record.day_gain_pct);
    }

    #[test]
    fn market_cap_computed_from_shares_and_price_as_last_resort() {
        let sources = RawQuoteSources {
            fast: Some(fast(Some(10.0), Some(9.5))),
            info: Some(InfoBundle {
                shares_outstanding: Some(2_000_000.0),
                float_shares: Some(1_500_000.0),
                market_cap: None,
            }),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        // sharesOutstanding wins over floatShares, then shares * price.
        assert_eq!(record.basic_shares_outstanding, Some(2_000_000.0));
        assert_eq!(record.market_cap, Some(20_000_000.0));
    }

    #[test]
    fn float_shares_fill_in_when_shares_outstanding_missing() {
        let sources = RawQuoteSources {
            fast: Some(fast(Some(10.0), Some(9.5))),
            info: Some(InfoBundle {
                shares_outstanding: None,
                float_shares: Some(1_500_000.0),
                market_cap: Some(15_500_000.0),
            }),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.basic_shares_outstanding, Some(1_500_000.0));
        assert_eq!(record.market_cap, Some(15_500_000.0));
    }

    #[test]
    fn reported_diluted_shares_win_over_any_assumption() {
        let statement = IncomeStatement {
            rows: vec![
                IncomeRow {
                    name: "Diluted Average Shares".to_string(),
                    periods: vec![Some(9_000_000.0)],
                },
                // Higher-priority machine-style name, latest period null.
                IncomeRow {
                    name: "DilutedAverageShares".to_string(),
                    periods: vec![None, Some(8_000_000.0)],
                },
            ],
        };
        let sources = RawQuoteSources {
            fast: Some(FastSnapshot {
                shares: Some(2_000_000.0),
                ..FastSnapshot::default()
            }),
            income: Some(statement),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        // The machine-style name is consulted first; its most recent
        // non-null period is 8,000,000.
        assert_eq!(record.assumed_diluted_shares_outstanding, Some(8_000_000.0));
        assert!(!record.diluted_is_assumed);
    }

    #[test]
    fn diluted_defaults_to_basic_under_equal_basic_policy() {
        let policy = DilutionPolicy::EqualBasic;
        assert_eq!(policy.name(), "equal-basic");

        let sources = RawQuoteSources {
            fast: Some(FastSnapshot {
                shares: Some(2_000_000.0),
                ..FastSnapshot::default()
            }),
            ..RawQuoteSources::default()
        };
        let record = normalize("TEST", &sources, ReferencePolicy::PreviousClose, policy);
        assert_eq!(record.assumed_diluted_shares_outstanding, Some(2_000_000.0));
        assert!(record.diluted_is_assumed);
    }

    #[test]
    fn diluted_inflated_by_factor_under_inflated_policy() {
        let policy = DilutionPolicy::Inflated {
            factor: DEFAULT_DILUTION_FACTOR,
        };
        assert_eq!(policy.name(), "inflated");

        let sources = RawQuoteSources {
            fast: Some(FastSnapshot {
                shares: Some(2_000_000.0),
                ..FastSnapshot::default()
            }),
            ..RawQuoteSources::default()
        };
        let record = normalize("TEST", &sources, ReferencePolicy::PreviousClose, policy);
        assert_eq!(record.assumed_diluted_shares_outstanding, Some(2_400_000.0));
        assert!(record.diluted_is_assumed);
    }

    #[test]
    fn dilution_assumption_propagates_null_basic_shares() {
        let record = normalize(
            "TEST",
            &RawQuoteSources::default(),
            ReferencePolicy::PreviousClose,
            DilutionPolicy::Inflated { factor: 1.2 },
        );
        assert_eq!(record.assumed_diluted_shares_outstanding, None);
        assert!(record.diluted_is_assumed);
    }

    #[test]
    fn same_day_open_policy_measures_intraday_change() {
        let policy = ReferencePolicy::SameDayOpen;
        assert_eq!(policy.name(), "same-day-open");

        let sources = RawQuoteSources {
            fast: Some(FastSnapshot {
                last_price: Some(10.0),
                previous_close: Some(9.5),
                open: Some(9.8),
                ..FastSnapshot::default()
            }),
            ..RawQuoteSources::default()
        };
        let record = normalize("TEST", &sources, policy, DilutionPolicy::EqualBasic);
        // Measured against the open, not yesterday's close.
        assert_eq!(record.day_gain, Some(0.2));
        assert_eq!(record.day_gain_pct, Some(2.0408));
    }

    #[test]
    fn same_day_open_falls_back_to_the_window_open() {
        let sources = RawQuoteSources {
            history: Some(bars(&[(Some(9.0), Some(9.5)), (Some(9.8), Some(10.0))])),
            ..RawQuoteSources::default()
        };
        let record = normalize(
            "TEST",
            &sources,
            ReferencePolicy::SameDayOpen,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.day_gain, Some(0.2));
    }

    #[test]
    fn empty_sources_produce_a_structurally_complete_record() {
        let record = normalize(
            "TEST",
            &RawQuoteSources::default(),
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        assert_eq!(record.symbol, "TEST");
        assert!(!record.timestamp.is_empty());
        assert_eq!(record.price, None);
        assert_eq!(record.day_gain, None);
        assert_eq!(record.day_gain_pct, None);
        assert_eq!(record.market_cap, None);
        assert_eq!(record.market_cap_day_gain, None);
        assert_eq!(record.market_cap_day_gain_pct, None);
        assert_eq!(record.basic_shares_outstanding, None);
        assert_eq!(record.assumed_diluted_shares_outstanding, None);
    }

    #[test]
    fn identical_inputs_yield_identical_records_except_timestamp() {
        let sources = RawQuoteSources {
            fast: Some(FastSnapshot {
                last_price: Some(10.0),
                previous_close: Some(9.5),
                market_cap: Some(55_000_000.0),
                shares: Some(5_500_000.0),
                ..FastSnapshot::default()
            }),
            ..RawQuoteSources::default()
        };
        let mut a = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        let mut b = normalize(
            "TEST",
            &sources,
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        a.timestamp = String::new();
        b.timestamp = String::new();
        assert_eq!(a, b);
    }

    #[test]
    fn record_serializes_missing_fields_as_null() {
        let record = normalize(
            "TEST",
            &RawQuoteSources::default(),
            ReferencePolicy::PreviousClose,
            DilutionPolicy::EqualBasic,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("price").unwrap().is_null());
        assert!(json.get("assumed_diluted_shares_outstanding").unwrap().is_null());
        // The provenance flag stays internal.
        assert!(json.get("diluted_is_assumed").is_none());
    }
}

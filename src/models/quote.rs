use serde::{Deserialize, Serialize};

/// Lightweight quote view, possibly stale or partial.
#[derive(Debug, Clone, Default)]
pub struct FastSnapshot {
    pub last_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares: Option<f64>,
}

/// 日线数据结构
#[derive(Debug, Clone, Default)]
pub struct DailyBar {
    pub open: Option<f64>,
    pub close: Option<f64>,
}

/// Detailed company fields, fetched only when the fast snapshot left gaps.
#[derive(Debug, Clone, Default)]
pub struct InfoBundle {
    pub shares_outstanding: Option<f64>,
    pub float_shares: Option<f64>,
    pub market_cap: Option<f64>,
}

/// One annual statement line item. Periods are most recent first.
#[derive(Debug, Clone)]
pub struct IncomeRow {
    pub name: String,
    pub periods: Vec<Option<f64>>,
}

/// 年度利润表行项目集合
#[derive(Debug, Clone, Default)]
pub struct IncomeStatement {
    pub rows: Vec<IncomeRow>,
}

/// The raw views collected for one run. A `None` source means the fetch
/// failed or was skipped; the normalizer treats both the same way.
#[derive(Debug, Clone, Default)]
pub struct RawQuoteSources {
    pub fast: Option<FastSnapshot>,
    /// Daily bars ordered oldest to newest, length 0-2.
    pub history: Option<Vec<DailyBar>>,
    pub info: Option<InfoBundle>,
    pub income: Option<IncomeStatement>,
}

/// The persisted snapshot. Field names are the on-disk JSON contract;
/// every numeric field is a finite number or null, never NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub symbol: String,
    pub timestamp: String,
    pub price: Option<f64>,
    pub day_gain: Option<f64>,
    pub day_gain_pct: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_day_gain: Option<f64>,
    pub market_cap_day_gain_pct: Option<f64>,
    pub basic_shares_outstanding: Option<f64>,
    pub assumed_diluted_shares_outstanding: Option<f64>,
    /// True when the diluted figure is an assumption derived from basic
    /// shares rather than a value reported in a statement.
    #[serde(skip)]
    pub diluted_is_assumed: bool,
}

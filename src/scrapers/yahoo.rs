use crate::errors::{QuoteHubError, Result};
use crate::models::quote::{DailyBar, FastSnapshot, IncomeRow, IncomeStatement, InfoBundle};
use crate::scrapers::base::MarketScraper;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// 请求的年度股本行项目类型
const SHARE_ITEM_TYPES: [&str; 2] = ["annualDilutedAverageShares", "annualBasicAverageShares"];

/// 雅虎财经数据抓取器
pub struct YahooScraper {
    client: Client,
    last_request: Mutex<Option<Instant>>,
}

impl YahooScraper {
    /// 创建新的雅虎财经数据抓取器
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()
            .map_err(QuoteHubError::RequestError)?;

        Ok(Self {
            client,
            last_request: Mutex::new(None),
        })
    }

    /// 等待请求频率限制
    async fn wait_for_rate_limit(&self) {
        const MIN_INTERVAL: Duration = Duration::from_millis(500);

        let now = Instant::now();
        let should_wait = {
            let mut last = self.last_request.lock().unwrap();
            let should_wait = if let Some(instant) = *last {
                let elapsed = instant.elapsed();
                if elapsed < MIN_INTERVAL {
                    Some(MIN_INTERVAL - elapsed)
                } else {
                    None
                }
            } else {
                None
            };
            *last = Some(now);
            should_wait
        };

        if let Some(wait_time) = should_wait {
            debug!("等待 {:?} 以遵守频率限制", wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    /// quoteSummary 接口，返回第一个结果对象
    async fn fetch_quote_summary(&self, symbol: &str, modules: &str) -> Result<Value> {
        self.wait_for_rate_limit().await;

        let url = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}",
            symbol.to_uppercase()
        );
        let response = self
            .client
            .get(&url)
            .query(&[("modules", modules)])
            .send()
            .await
            .map_err(QuoteHubError::RequestError)?;

        let text = response.text().await?;
        debug!("成功获取 quoteSummary 响应 ({} modules)", modules);

        let json: Value = serde_json::from_str(&text)?;
        json.get("quoteSummary")
            .and_then(|q| q.get("result"))
            .and_then(|r| r.get(0))
            .cloned()
            .ok_or_else(|| {
                QuoteHubError::DataError(format!("Empty quoteSummary result for {}", symbol))
            })
    }
}

#[async_trait]
impl MarketScraper for YahooScraper {
    fn source_code(&self) -> &'static str {
        "YAHOO"
    }

    async fn fetch_fast_snapshot(&self, symbol: &str) -> Result<FastSnapshot> {
        info!("获取 {} 的轻量行情快照", symbol);
        let result = self.fetch_quote_summary(symbol, "price").await?;
        Ok(parse_fast_snapshot(&result))
    }

    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<DailyBar>> {
        info!("获取 {} 最近 {} 天的日线数据", symbol, days);
        self.wait_for_rate_limit().await;

        let tckr = symbol.to_uppercase();
        let url = format!("https://query1.finance.yahoo.com/v8/finance/chart/{}", tckr);
        let range = format!("{}d", days);
        let response: ChartEnvelope = self
            .client
            .get(&url)
            .query(&[
                ("symbol", tckr.as_str()),
                ("interval", "1d"),
                ("range", range.as_str()),
                ("events", "div|split|capitalGains"),
            ])
            .send()
            .await
            .map_err(QuoteHubError::RequestError)?
            .json()
            .await
            .map_err(QuoteHubError::RequestError)?;

        let result = response
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| QuoteHubError::DataError(format!("No chart data for {}", symbol)))?;

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| QuoteHubError::DataError(format!("No quote indicators for {}", symbol)))?;

        let opens = quote.open.unwrap_or_default();
        let closes = quote.close.unwrap_or_default();
        let len = opens.len().max(closes.len());

        let mut bars = Vec::with_capacity(len);
        for i in 0..len {
            bars.push(DailyBar {
                open: opens.get(i).copied().flatten(),
                close: closes.get(i).copied().flatten(),
            });
        }

        info!("成功获取 {} 条日线数据", bars.len());
        Ok(bars)
    }

    async fn fetch_info_bundle(&self, symbol: &str) -> Result<InfoBundle> {
        info!("获取 {} 的公司详细信息", symbol);
        let result = self
            .fetch_quote_summary(symbol, "defaultKeyStatistics,summaryDetail")
            .await?;
        Ok(parse_info_bundle(&result))
    }

    async fn fetch_income_statement(&self, symbol: &str) -> Result<IncomeStatement> {
        info!("获取 {} 的年度利润表股本行项目", symbol);
        self.wait_for_rate_limit().await;

        // 回溯五年的年报区间
        let period2 = Utc::now().timestamp();
        let period1 = period2 - 5 * 366 * 86_400;
        let url = format!(
            "https://query1.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries/{}",
            symbol.to_uppercase()
        );
        let types = SHARE_ITEM_TYPES.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("type", types.as_str()),
                ("period1", period1.to_string().as_str()),
                ("period2", period2.to_string().as_str()),
                ("merge", "false"),
            ])
            .send()
            .await
            .map_err(QuoteHubError::RequestError)?;

        let text = response.text().await?;
        let json: Value = serde_json::from_str(&text)?;

        let statement = parse_income_statement(&json);
        info!("成功获取 {} 个利润表行项目", statement.rows.len());
        Ok(statement)
    }
}

/// Unwraps Yahoo's `{"raw": n, "fmt": "..."}` number envelope at `path`.
fn raw_f64(value: &Value, path: &[&str]) -> Option<f64> {
    let mut cur = value;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.get("raw").and_then(Value::as_f64).or_else(|| cur.as_f64())
}

pub(crate) fn parse_fast_snapshot(result: &Value) -> FastSnapshot {
    FastSnapshot {
        last_price: raw_f64(result, &["price", "regularMarketPrice"]),
        previous_close: raw_f64(result, &["price", "regularMarketPreviousClose"]),
        open: raw_f64(result, &["price", "regularMarketOpen"]),
        market_cap: raw_f64(result, &["price", "marketCap"]),
        // price 模块不提供股本数量
        shares: None,
    }
}

pub(crate) fn parse_info_bundle(result: &Value) -> InfoBundle {
    InfoBundle {
        shares_outstanding: raw_f64(result, &["defaultKeyStatistics", "sharesOutstanding"]),
        float_shares: raw_f64(result, &["defaultKeyStatistics", "floatShares"]),
        market_cap: raw_f64(result, &["summaryDetail", "marketCap"]),
    }
}

pub(crate) fn parse_income_statement(json: &Value) -> IncomeStatement {
    let mut rows = Vec::new();

    let results = json
        .get("timeseries")
        .and_then(|t| t.get("result"))
        .and_then(Value::as_array);

    if let Some(results) = results {
        for entry in results {
            let item_type = entry
                .get("meta")
                .and_then(|m| m.get("type"))
                .and_then(|t| t.get(0))
                .and_then(Value::as_str);
            let item_type = match item_type {
                Some(t) => t,
                None => continue,
            };

            // 数值数组位于以类型命名的键下，每期一项，时间从旧到新
            let mut periods: Vec<Option<f64>> = entry
                .get(item_type)
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .map(|v| {
                            v.get("reportedValue")
                                .and_then(|r| r.get("raw"))
                                .and_then(Value::as_f64)
                        })
                        .collect()
                })
                .unwrap_or_default();
            periods.reverse();

            rows.push(IncomeRow {
                name: statement_row_name(item_type),
                periods,
            });
        }
    }

    IncomeStatement { rows }
}

/// Strips the provider's period prefix: `annualDilutedAverageShares`
/// becomes the statement row name `DilutedAverageShares`.
fn statement_row_name(item_type: &str) -> String {
    item_type
        .strip_prefix("annual")
        .or_else(|| item_type.strip_prefix("trailing"))
        .or_else(|| item_type.strip_prefix("quarterly"))
        .unwrap_or(item_type)
        .to_string()
}

// >> Input: Yahoo Finance chart API
// ==========================================================================
#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: ChartResponse,
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Debug)]
struct ChartQuote {
    open: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

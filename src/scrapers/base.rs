use crate::errors::Result;
use crate::models::quote::{DailyBar, FastSnapshot, IncomeStatement, InfoBundle};
use async_trait::async_trait;

/// Base trait for market data scrapers
#[async_trait]
pub trait MarketScraper {
    /// Get the data source code this scraper is for
    fn source_code(&self) -> &'static str;

    /// Fetch the lightweight quote snapshot for a symbol
    async fn fetch_fast_snapshot(&self, symbol: &str) -> Result<FastSnapshot>;

    /// Fetch up to `days` daily bars for a symbol, oldest to newest
    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<DailyBar>>;

    /// Fetch detailed company info fields for a symbol
    async fn fetch_info_bundle(&self, symbol: &str) -> Result<InfoBundle>;

    /// Fetch annual income statement line items, most recent period first
    async fn fetch_income_statement(&self, symbol: &str) -> Result<IncomeStatement>;
}

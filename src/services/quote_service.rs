use crate::config::Config;
use crate::errors::{QuoteHubError, Result};
use crate::models::quote::{QuoteRecord, RawQuoteSources};
use crate::normalizer::{normalize, ReferencePolicy};
use crate::scrapers::base::MarketScraper;
use crate::util::to_finite;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 行情快照服务，处理数据的采集、归一化和存储
pub struct QuoteService {
    config: Config,
    scraper: Arc<dyn MarketScraper + Send + Sync>,
    output_path: PathBuf,
}

impl QuoteService {
    /// 创建新的行情快照服务实例
    pub fn new(config: Config, scraper: Arc<dyn MarketScraper + Send + Sync>) -> Self {
        let output_path = PathBuf::from(&config.output_path);
        Self {
            config,
            scraper,
            output_path,
        }
    }

    /// 获取输出文件路径
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Collects whichever raw views the provider can still supply. A failed
    /// fetch degrades to an absent source; follow-up fetches are made only
    /// for fields the fast snapshot left missing.
    pub async fn collect_sources(&self) -> RawQuoteSources {
        let symbol = &self.config.symbol;

        let fast = match self.scraper.fetch_fast_snapshot(symbol).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Failed to fetch fast snapshot for {}: {}", symbol, e);
                None
            }
        };

        let price_side_missing = {
            let last_price = fast.as_ref().and_then(|f| to_finite(f.last_price));
            let reference = match self.config.reference_policy {
                ReferencePolicy::PreviousClose => {
                    fast.as_ref().and_then(|f| to_finite(f.previous_close))
                }
                ReferencePolicy::SameDayOpen => fast.as_ref().and_then(|f| to_finite(f.open)),
            };
            last_price.is_none() || reference.is_none()
        };
        let history = if price_side_missing {
            match self.scraper.fetch_history(symbol, 2).await {
                Ok(bars) => Some(bars),
                Err(e) => {
                    warn!("Failed to fetch history for {}: {}", symbol, e);
                    None
                }
            }
        } else {
            None
        };

        let cap_side_missing = fast.as_ref().map_or(true, |f| {
            to_finite(f.market_cap).is_none() || to_finite(f.shares).is_none()
        });
        let info = if cap_side_missing {
            match self.scraper.fetch_info_bundle(symbol).await {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    warn!("Failed to fetch info bundle for {}: {}", symbol, e);
                    None
                }
            }
        } else {
            None
        };

        let income = match self.scraper.fetch_income_statement(symbol).await {
            Ok(statement) => Some(statement),
            Err(e) => {
                warn!("Failed to fetch income statement for {}: {}", symbol, e);
                None
            }
        };

        RawQuoteSources {
            fast,
            history,
            info,
            income,
        }
    }

    /// 采集并归一化一份快照记录
    pub async fn capture(&self) -> QuoteRecord {
        let sources = self.collect_sources().await;
        normalize(
            &self.config.symbol,
            &sources,
            self.config.reference_policy,
            self.config.dilution_policy,
        )
    }

    /// Runs one snapshot: capture, then persist. A record with no price at
    /// all is the one hard failure; the caller must skip publishing instead
    /// of publishing an empty record.
    pub async fn run(&self) -> Result<QuoteRecord> {
        info!(
            "Capturing {} snapshot from {}",
            self.config.symbol,
            self.scraper.source_code()
        );
        let record = self.capture().await;

        if record.price.is_none() {
            return Err(QuoteHubError::NoPriceData(self.config.symbol.clone()));
        }

        self.write_record(&record)?;
        info!(
            "Wrote {} snapshot to {}",
            self.config.symbol,
            self.output_path.display()
        );
        Ok(record)
    }

    /// 将快照以美化JSON格式原子化写入输出文件
    pub fn write_record(&self, record: &QuoteRecord) -> Result<()> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(record)?;

        // Full overwrite has to be atomic: write a sibling temp file, then
        // rename it over the target.
        let tmp_path = self.output_path.with_extension("json.tmp");
        fs::write(&tmp_path, json.as_bytes())?;
        fs::rename(&tmp_path, &self.output_path)?;

        Ok(())
    }
}

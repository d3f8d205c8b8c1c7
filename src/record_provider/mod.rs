use log::{error, info};

use crate::errors::{QuoteHubError, Result};
use crate::models::quote::QuoteRecord;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// 行情快照记录提供者，用于访问已发布的快照数据
pub struct QuoteRecordProvider {
    record: QuoteRecord,
}

impl QuoteRecordProvider {
    /// 从本地文件加载快照记录
    pub fn load_from_file(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let record: QuoteRecord = serde_json::from_str(&text)?;
        Ok(Self { record })
    }

    /// Loads the local record, first refreshing it from the published URL
    /// when the remote copy looks newer. A failed check is logged and the
    /// local copy is used as-is.
    pub fn load_with_remote_check(path: &str, url: &str) -> Result<Self> {
        if let Err(e) = Self::refresh_if_stale(path, url) {
            error!("Failed to check {} for updates: {}", url, e);
        }
        Self::load_from_file(path)
    }

    /// 获取快照记录
    pub fn record(&self) -> &QuoteRecord {
        &self.record
    }

    // 同步检查远程文件是否有更新，必要时重新下载
    fn refresh_if_stale(path: &str, url: &str) -> Result<()> {
        let local_metadata = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => {
                // 本地文件不存在，直接下载
                return Self::download_sync(url, path);
            }
        };

        let client = reqwest::blocking::Client::new();
        let resp = client.head(url).send()?;

        if !resp.status().is_success() {
            return Err(QuoteHubError::DataError(format!(
                "Remote record check failed: HTTP status {}",
                resp.status()
            )));
        }

        // 大小不同即视为有更新
        let remote_size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        if remote_size > 0 && remote_size != local_metadata.len() {
            info!("Remote record size differs. Downloading updates...");
            return Self::download_sync(url, path);
        }

        // 再比较修改时间
        let local_modified = local_metadata
            .modified()
            .unwrap_or_else(|_| SystemTime::now())
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        if let Some(last_modified) = resp
            .headers()
            .get("last-modified")
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(remote_time) = httpdate::parse_http_date(last_modified) {
                let remote_secs = remote_time
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();

                if remote_secs > local_modified {
                    info!("Remote record is newer. Downloading updates...");
                    return Self::download_sync(url, path);
                }
            }
        }

        Ok(())
    }

    // 同步下载已发布的快照文件
    fn download_sync(url: &str, path: &str) -> Result<()> {
        info!("Downloading published record from: {}", url);

        let client = reqwest::blocking::Client::new();
        let resp = client.get(url).send()?;
        if !resp.status().is_success() {
            return Err(QuoteHubError::DataError(format!(
                "Failed to download record: HTTP status {}",
                resp.status()
            )));
        }

        let bytes = resp.bytes()?;
        fs::write(path, &bytes)?;

        info!("Successfully downloaded published record");
        Ok(())
    }
}

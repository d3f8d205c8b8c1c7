use crate::errors::{QuoteHubError, Result};
use log::info;
use std::path::Path;
use std::process::Command;

/// Publishes the snapshot file as a single moving commit on a fixed branch.
/// Re-runs amend that commit and force-push it, so the publish branch never
/// accumulates history. The normalizer and service know nothing about this
/// step.
pub struct GitPublisher {
    branch: String,
}

impl GitPublisher {
    pub fn new(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
        }
    }

    pub fn publish(&self, path: &Path, message: &str) -> Result<()> {
        let file = path
            .to_str()
            .ok_or_else(|| QuoteHubError::PublishError(format!("Invalid path {:?}", path)))?;

        info!("添加快照文件到git: {}", file);
        run_command("git", &["add", file])?;

        // 若上一次发布提交仍在HEAD，则修改该提交，否则创建新提交
        if head_subject().as_deref() == Some(message) {
            info!("修改上一次发布提交");
            run_command("git", &["commit", "--amend", "-m", message])?;
        } else {
            info!("创建发布提交");
            run_command("git", &["commit", "-m", message])?;
        }

        // 检查是否有远程仓库配置
        let has_remote = Command::new("git")
            .args(["remote", "-v"])
            .output()
            .map(|output| !output.stdout.is_empty())
            .unwrap_or(false);

        if has_remote {
            info!("强制推送到远程分支 {}", self.branch);
            run_command(
                "git",
                &["push", "--force", "origin", &format!("HEAD:{}", self.branch)],
            )?;
        } else {
            info!("未配置远程仓库，跳过推送步骤");
        }

        Ok(())
    }
}

fn run_command(cmd: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(cmd).args(args).status()?;

    if !status.success() {
        return Err(QuoteHubError::PublishError(format!(
            "命令执行失败: {} {:?}",
            cmd, args
        )));
    }

    Ok(())
}

/// Subject line of the current HEAD commit, if any.
fn head_subject() -> Option<String> {
    let output = Command::new("git")
        .args(["log", "-1", "--pretty=%s"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

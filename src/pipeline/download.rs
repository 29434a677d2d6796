// src/pipeline/download.rs

use super::task_runner::Job;
use crate::{client::RobustClient, error::*, models::JobStatus};
use futures::StreamExt;
use log::{debug, info};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// 一个下载任务：把 `url` 的内容保存到 `dest`。
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub dest: PathBuf,
}

impl Job for DownloadJob {
    fn label(&self) -> String {
        file_label(&self.dest)
    }
}

pub(super) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 把远程视频下载到本地。
///
/// 数据先写入同目录下的 `.part` 临时文件，传输完整后才重命名为最终文件名，
/// 因此最终路径上要么是完整的文件，要么什么都没有。
#[derive(Clone)]
pub struct AssetDownloader {
    http_client: Arc<RobustClient>,
    cancellation_token: CancellationToken,
}

impl AssetDownloader {
    pub fn new(http_client: Arc<RobustClient>, cancellation_token: CancellationToken) -> Self {
        Self {
            http_client,
            cancellation_token,
        }
    }

    pub async fn download(&self, url: &str, dest: &Path) -> AppResult<JobStatus> {
        if dest.exists() {
            debug!("文件已存在，跳过下载: {}", dest.display());
            return Ok(JobStatus::Skipped);
        }

        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent).await?;

        // 临时文件在 drop 时自动删除：失败、取消或任务被中止时都不会残留
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}.", file_label(dest)))
            .suffix(".part")
            .tempfile_in(parent)?;
        let mut file = tokio::fs::File::from_std(staging.reopen()?);

        let written = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => {
                debug!("下载被取消: {}", url);
                return Err(AppError::UserInterrupt);
            }
            result = self.transfer(url, &mut file) => result?,
        };
        drop(file);

        staging.persist(dest)?;
        info!("下载完成: {} ({} 字节)", dest.display(), written);
        Ok(JobStatus::Success)
    }

    async fn transfer(&self, url: &str, file: &mut tokio::fs::File) -> AppResult<u64> {
        let res = self
            .http_client
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        let expected_size = res.content_length();

        let mut written: u64 = 0;
        let mut stream = res.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected_size {
            if expected != written {
                return Err(AppError::Validation(format!(
                    "大小不一致 (预期: {}, 实际: {})",
                    expected, written
                )));
            }
        }
        if written == 0 {
            return Err(AppError::Validation("响应内容为空".to_string()));
        }
        Ok(written)
    }
}

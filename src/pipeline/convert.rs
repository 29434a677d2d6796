// src/pipeline/convert.rs

use super::{download::file_label, ffmpeg, profile::EncodingProfile, task_runner::Job};
use crate::{
    config::AppConfig,
    error::*,
    models::{JobStatus, OutputFormat},
};
use log::{debug, info};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// 一个转换任务：`input` → `output`
#[derive(Debug, Clone)]
pub struct ConvertJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
}

impl Job for ConvertJob {
    fn label(&self) -> String {
        file_label(&self.output)
    }
}

/// 调用 ffmpeg 把原始视频转换为目标格式。
#[derive(Clone)]
pub struct MediaConverter {
    program: Option<PathBuf>,
    configured: Option<PathBuf>,
    cancellation_token: CancellationToken,
}

impl MediaConverter {
    /// 使用指定的 ffmpeg 可执行文件
    pub fn new(program: impl Into<PathBuf>, cancellation_token: CancellationToken) -> Self {
        Self {
            program: Some(program.into()),
            configured: None,
            cancellation_token,
        }
    }

    /// 在第一次真正需要转换时才查找 ffmpeg
    pub fn from_config(config: &AppConfig, cancellation_token: CancellationToken) -> Self {
        Self {
            program: None,
            configured: config.ffmpeg_path.clone(),
            cancellation_token,
        }
    }

    fn program(&self) -> AppResult<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => ffmpeg::resolve_ffmpeg(self.configured.as_deref())
                .map(Path::to_path_buf)
                .ok_or(AppError::FfmpegNotFound),
        }
    }

    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> AppResult<JobStatus> {
        if !input.exists() {
            debug!("原始视频不存在，跳过转换: {}", input.display());
            return Ok(JobStatus::NoInput);
        }
        if output.exists() {
            debug!("转换结果已存在，跳过: {}", output.display());
            return Ok(JobStatus::Skipped);
        }
        let program = self.program()?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent).await?;

        // 保留扩展名，方便排查；实际格式由 -f 指定
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}.", file_label(output)))
            .suffix(&format!(".part.{}", format.extension()))
            .tempfile_in(parent)?;

        let profile = EncodingProfile::for_format(format);
        let mut cmd = Command::new(&program);
        cmd.args(profile.ffmpeg_args(input, staging.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => {
                debug!("转换被取消: {}", input.display());
                return Err(AppError::UserInterrupt);
            }
            result = cmd.output() => result,
        };
        let process_output = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::FfmpegNotFound),
            Err(e) => return Err(e.into()),
        };

        if !process_output.status.success() {
            let stderr = String::from_utf8_lossy(&process_output.stderr);
            debug!("ffmpeg 输出 ({}):\n{}", input.display(), stderr.trim());
            let last_line = stderr.lines().last().unwrap_or_default().trim().to_string();
            return Err(AppError::Transcode {
                input: input.to_path_buf(),
                reason: if last_line.is_empty() {
                    process_output.status.to_string()
                } else {
                    format!("{}: {}", process_output.status, last_line)
                },
            });
        }

        let size = std::fs::metadata(staging.path())?.len();
        if size == 0 {
            return Err(AppError::Transcode {
                input: input.to_path_buf(),
                reason: "输出文件为空".to_string(),
            });
        }

        staging.persist(output)?;
        info!("转换完成: {} ({} 字节)", output.display(), size);
        Ok(JobStatus::Success)
    }
}

// src/models/mod.rs

pub mod api;

use crate::{constants, error::AppError, symbols};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// 转换后的媒体形式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    #[value(name = "video-h264")]
    VideoH264,
    #[value(name = "video-vp9")]
    VideoVp9,
    #[value(name = "image-webp")]
    ImageWebp,
    #[value(name = "image-av1")]
    ImageAv1,
}

/// 媒体在卡片上的呈现方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::VideoH264 => "mp4",
            OutputFormat::VideoVp9 => "webm",
            OutputFormat::ImageWebp => "webp",
            OutputFormat::ImageAv1 => "avif",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            OutputFormat::VideoH264 | OutputFormat::VideoVp9 => MediaKind::Video,
            OutputFormat::ImageWebp | OutputFormat::ImageAv1 => MediaKind::Image,
        }
    }

    /// 转换产物的文件名，只由 (id, 格式) 决定。
    pub fn file_name(&self, id: &str) -> String {
        format!("{}.{}", id, self.extension())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        f.write_str(&value)
    }
}

/// 原始下载文件名
pub fn raw_file_name(id: &str) -> String {
    format!("{}.{}", id, constants::media::RAW_SUFFIX)
}

/// 卡片的出题方向
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateVariant {
    /// 日语 → 手语
    #[value(name = "ja2jsl")]
    Ja2Jsl,
    /// 手语 → 日语
    #[value(name = "jsl2ja")]
    Jsl2Ja,
    #[value(name = "both")]
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: String,
}

/// 从页面数据中校验得到的单个手语条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRecord {
    pub id: String,
    pub definition: String,
    pub position: String,
    pub video_source_url: String,
    pub category: String,
    pub category_id: String,
}

/// 一张卡片对应的全部信息。构造后不再修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub definition: String,
    pub position: String,
    pub category: String,
    pub video_url: String,
    pub page_url: String,
    pub raw_video_path: PathBuf,
    pub output_media_path: PathBuf,
}

impl Note {
    /// 打包时应当引用的媒体文件：转换开启时为转换产物，否则为原始视频。
    pub fn media_path(&self, converted: bool) -> &Path {
        if converted {
            &self.output_media_path
        } else {
            &self.raw_video_path
        }
    }
}

// --- 任务状态 ---

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum JobStatus {
    Success,
    Skipped,
    NoInput,
    HttpError,
    NetworkError,
    ConnectionError,
    TimeoutError,
    IoError,
    ValidationError,
    TranscodeError,
    UnexpectedError,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, JobStatus::Skipped | JobStatus::NoInput)
    }

    pub fn get_display_info(
        &self,
    ) -> (
        &'static ColoredString,
        fn(ColoredString) -> ColoredString,
        &'static str,
    ) {
        match self {
            JobStatus::Success => (&symbols::OK, |s| s.green(), "完了"),
            JobStatus::Skipped => (&symbols::INFO, |s| s.cyan(), "既に存在するためスキップ"),
            JobStatus::NoInput => (&symbols::INFO, |s| s.cyan(), "元の動画がないためスキップ"),
            JobStatus::HttpError => (&symbols::ERROR, |s| s.red(), "サーバーがエラーを返しました"),
            JobStatus::NetworkError => (&symbols::ERROR, |s| s.red(), "ネットワークエラー"),
            JobStatus::ConnectionError => (&symbols::ERROR, |s| s.red(), "接続できませんでした"),
            JobStatus::TimeoutError => (&symbols::WARN, |s| s.yellow(), "タイムアウトしました"),
            JobStatus::IoError => (&symbols::ERROR, |s| s.red(), "ファイルの読み書きに失敗しました"),
            JobStatus::ValidationError => (&symbols::ERROR, |s| s.red(), "ファイルが不完全です"),
            JobStatus::TranscodeError => (&symbols::ERROR, |s| s.red(), "ffmpegによる変換に失敗しました"),
            JobStatus::UnexpectedError => (&symbols::ERROR, |s| s.red(), "予期しないエラー"),
        }
    }
}

impl From<&AppError> for JobStatus {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::Network(err)
            | AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(err)) => {
                if err.is_timeout() {
                    JobStatus::TimeoutError
                } else if err.is_connect() {
                    JobStatus::ConnectionError
                } else if err.is_status() {
                    JobStatus::HttpError
                } else {
                    JobStatus::NetworkError
                }
            }
            AppError::NetworkMiddleware(_) => JobStatus::NetworkError,
            AppError::Io(_) | AppError::TempFilePersist(_) => JobStatus::IoError,
            AppError::Validation(_) => JobStatus::ValidationError,
            AppError::Transcode { .. } => JobStatus::TranscodeError,
            AppError::Stage { source, .. } => JobStatus::from(source.as_ref()),
            _ => JobStatus::UnexpectedError,
        }
    }
}

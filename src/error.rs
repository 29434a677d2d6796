// src/error.rs

use std::{fmt, path::PathBuf};
use thiserror::Error;

/// 流水线的各个阶段，用于在顶层给出“哪一步失败了”的提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Download,
    Convert,
    Package,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Metadata => "手話データの取得",
            Stage::Download => "動画のダウンロード",
            Stage::Convert => "動画の変換",
            Stage::Package => "Ankiパッケージの作成",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("无法解析来自 '{url}' 的页面数据: {source}")]
    PayloadParseFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("页面 '{url}' 中未找到 {what}")]
    MetadataMissing { url: String, what: &'static str },
    #[error("未找到 ffmpeg 可执行文件")]
    FfmpegNotFound,
    #[error("ffmpeg 转换 '{}' 失败: {reason}", input.display())]
    Transcode { input: PathBuf, reason: String },
    #[error("文件校验失败: {0}")]
    Validation(String),
    #[error("数据库错误: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ZIP 打包错误: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("用户中断")]
    UserInterrupt,
    #[error("[{stage}] {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AppError>,
    },
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// 致命错误会中止整批任务，而不是只记为单项失败。
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::FfmpegNotFound | AppError::UserInterrupt => true,
            AppError::Stage { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        match self {
            AppError::UserInterrupt => true,
            AppError::Stage { source, .. } => source.is_interrupt(),
            _ => false,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// 为错误附上阶段信息；已附加过的错误保持原样。
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            e @ AppError::Stage { .. } => e,
            e => AppError::Stage {
                stage,
                source: Box::new(e),
            },
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// 为 `AppResult` 提供 `.stage(..)` 的便捷写法。
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> AppResult<T>;
}

impl<T> StageContext<T> for AppResult<T> {
    fn stage(self, stage: Stage) -> AppResult<T> {
        self.map_err(|e| e.in_stage(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_fatal_and_interrupt() {
        let err = AppError::UserInterrupt.in_stage(Stage::Download);
        assert!(err.is_fatal());
        assert!(err.is_interrupt());
        assert_eq!(err.stage(), Some(Stage::Download));

        // 已经带有阶段信息的错误不会被重复包装
        let rewrapped = err.in_stage(Stage::Convert);
        assert_eq!(rewrapped.stage(), Some(Stage::Download));
    }

    #[test]
    fn test_per_item_errors_are_not_fatal() {
        let err = AppError::Transcode {
            input: PathBuf::from("a.raw.mp4"),
            reason: "exit status 1".into(),
        };
        assert!(!err.is_fatal());
        assert!(AppError::FfmpegNotFound.is_fatal());
        assert!(!AppError::FfmpegNotFound.is_interrupt());
    }
}

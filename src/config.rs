// src/config.rs

pub mod external;

use self::external::load_or_create_external_config;
use crate::{
    cli::Cli,
    constants,
    error::AppResult,
    models::{OutputFormat, TemplateVariant},
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// 显式指定的 ffmpeg 路径，优先于 PATH 搜索
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
}

/// 用户主目录下的配置文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_base_url() -> String {
    constants::DEFAULT_BASE_URL.to_string()
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        Self {
            base_url: default_base_url(),
            network: NetworkConfig {
                connect_timeout_secs: Some(10),
                timeout_secs: Some(120),
                max_retries: Some(3),
                request_delay_ms: Some(constants::REQUEST_DELAY_MS),
            },
            tools: ToolsConfig::default(),
        }
    }
}

/// 一次运行的完整配置。启动时构造一次，之后只读。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub should_download: bool,
    pub should_convert: bool,
    pub output_format: OutputFormat,
    pub template_variant: TemplateVariant,
    pub media_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub output_path: PathBuf,
    pub refresh_metadata: bool,
    pub base_url: String,
    pub request_delay: Duration,
    pub download_workers: usize,
    pub convert_workers: usize,
    pub ffmpeg_path: Option<PathBuf>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;
        Ok(Self::from_parts(args, external_config))
    }

    pub fn from_parts(args: &Cli, external_config: ExternalConfig) -> Self {
        let network = external_config.network;
        Self {
            should_download: !args.no_download,
            should_convert: !args.no_convert,
            output_format: args.format,
            template_variant: args.template,
            media_dir: args.media_dir.clone(),
            cache_dir: args.media_dir.join(constants::METADATA_CACHE_DIR),
            output_path: args.output.clone(),
            refresh_metadata: args.refresh,
            base_url: external_config.base_url.trim_end_matches('/').to_string(),
            request_delay: Duration::from_millis(
                network.request_delay_ms.unwrap_or(constants::REQUEST_DELAY_MS),
            ),
            download_workers: worker_count(args.workers, constants::MAX_DOWNLOAD_WORKERS),
            convert_workers: worker_count(args.workers, constants::MAX_CONVERT_WORKERS),
            ffmpeg_path: external_config.tools.ffmpeg_path,
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(network.timeout_secs.unwrap_or(120)),
            max_retries: network.max_retries.unwrap_or(3),
        }
    }
}

/// 并发数：默认取 CPU 核数，统一限制在 [1, cap] 之间。
pub fn worker_count(requested: Option<usize>, cap: usize) -> usize {
    let wanted = requested.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    let clamped = wanted.clamp(1, cap.max(1));
    if requested.is_some_and(|r| r != clamped) {
        warn!("并发数 {:?} 超出范围，已调整为 {}", requested, clamped);
    }
    clamped
}

#[cfg(any(test, feature = "testing"))]
impl Default for AppConfig {
    fn default() -> Self {
        let media_dir = PathBuf::from(constants::DEFAULT_MEDIA_DIR);
        Self {
            should_download: true,
            should_convert: true,
            output_format: OutputFormat::ImageWebp,
            template_variant: TemplateVariant::Ja2Jsl,
            cache_dir: media_dir.join(constants::METADATA_CACHE_DIR),
            media_dir,
            output_path: PathBuf::from(constants::DEFAULT_PACKAGE_NAME),
            refresh_metadata: false,
            base_url: constants::DEFAULT_BASE_URL.to_string(),
            request_delay: Duration::from_millis(0),
            download_workers: 4,
            convert_workers: 2,
            ffmpeg_path: None,
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 0,
        }
    }
}

#[cfg(feature = "testing")]
impl AppConfig {
    /// 让媒体目录与缓存目录一起指向测试用的临时目录
    pub fn with_media_dir(mut self, media_dir: impl Into<PathBuf>) -> Self {
        self.media_dir = media_dir.into();
        self.cache_dir = self.media_dir.join(constants::METADATA_CACHE_DIR);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_worker_count_is_clamped() {
        assert_eq!(worker_count(Some(0), 4), 1);
        assert_eq!(worker_count(Some(100), 4), 4);
        assert_eq!(worker_count(Some(3), 8), 3);
        let auto = worker_count(None, constants::MAX_CONVERT_WORKERS);
        assert!((1..=constants::MAX_CONVERT_WORKERS).contains(&auto));
    }

    #[test]
    fn test_from_parts_merges_cli_and_file() {
        let args = Cli::parse_from([
            "signtown-anki",
            "--no-download",
            "--media-dir",
            "media",
            "-w",
            "64",
        ]);
        let mut external = ExternalConfig::default_app_config();
        external.base_url = "http://127.0.0.1:1234/".into();
        external.tools.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg"));

        let config = AppConfig::from_parts(&args, external);
        assert!(!config.should_download);
        assert!(config.should_convert);
        assert_eq!(config.base_url, "http://127.0.0.1:1234");
        assert_eq!(config.cache_dir, PathBuf::from("media").join(constants::METADATA_CACHE_DIR));
        assert_eq!(config.download_workers, constants::MAX_DOWNLOAD_WORKERS);
        assert_eq!(config.convert_workers, constants::MAX_CONVERT_WORKERS);
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
        assert_eq!(config.request_delay, Duration::from_millis(constants::REQUEST_DELAY_MS));
    }

    #[test]
    fn test_external_config_tolerates_missing_sections() {
        let parsed: ExternalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.base_url, constants::DEFAULT_BASE_URL);
        assert!(parsed.tools.ffmpeg_path.is_none());
        assert!(parsed.network.max_retries.is_none());
    }
}

// src/cli.rs

use crate::{
    constants,
    models::{OutputFormat, TemplateVariant},
};
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about = "handbook.sign.townをスクレイピングしてAnkiパッケージを作るコマンド",
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true,
)]
pub struct Cli {
    // --- 选项 (Options) ---
    /// 動画をダウンロードしません (既存の動画ファイルのみ使用)
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub no_download: bool,
    /// ffmpegによる動画の変換を行いません
    #[arg(long, alias = "without-ffmpeg", action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub no_convert: bool,
    /// 変換後のメディア形式
    #[arg(short, long, value_enum, default_value_t = OutputFormat::ImageWebp, help_heading = "Options")]
    pub format: OutputFormat,
    /// カードの出題方向
    #[arg(short, long, value_enum, default_value_t = TemplateVariant::Ja2Jsl, help_heading = "Options")]
    pub template: TemplateVariant,
    /// 動画ファイルの保存先ディレクトリ
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_MEDIA_DIR), help_heading = "Options")]
    pub media_dir: PathBuf,
    /// 出力するAnkiパッケージのパス
    #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from(constants::DEFAULT_PACKAGE_NAME), help_heading = "Options")]
    pub output: PathBuf,
    /// 同時に実行するジョブの最大数
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Options")]
    pub workers: Option<usize>,
    /// キャッシュを無視して手話データを再取得します
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub refresh: bool,

    // --- 通用选项 (General) ---
    /// このヘルプを表示して終了します
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// バージョン情報を表示して終了します
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["signtown-anki"]);
        assert!(!cli.no_download);
        assert!(!cli.no_convert);
        assert_eq!(cli.format, OutputFormat::ImageWebp);
        assert_eq!(cli.template, TemplateVariant::Ja2Jsl);
        assert_eq!(cli.media_dir, PathBuf::from(constants::DEFAULT_MEDIA_DIR));
        assert_eq!(cli.log_level, LogLevel::Off);
    }

    #[test]
    fn test_legacy_without_ffmpeg_alias() {
        let cli = Cli::parse_from(["signtown-anki", "--without-ffmpeg", "-f", "video-vp9", "-t", "both"]);
        assert!(cli.no_convert);
        assert_eq!(cli.format, OutputFormat::VideoVp9);
        assert_eq!(cli.template, TemplateVariant::Both);
    }
}

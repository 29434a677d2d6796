// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logger;
pub mod metadata;
pub mod models;
pub mod notes;
pub mod package;
pub mod pipeline;
pub mod symbols;
pub mod ui;
pub mod utils;

use crate::{
    cli::Cli,
    client::RobustClient,
    config::AppConfig,
    error::*,
    metadata::HandbookFetcher,
    package::{ApkgWriter, PackageWriter},
    pipeline::StageManager,
};
use anyhow::anyhow;
use log::{debug, info};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

/// 流水线各阶段共享的状态
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<AppConfig>,
    pub http_client: Arc<RobustClient>,
    pub cancellation_token: CancellationToken,
}

impl PipelineContext {
    pub fn new(config: AppConfig, cancellation_token: CancellationToken) -> AppResult<Self> {
        let config = Arc::new(config);
        let http_client = Arc::new(RobustClient::new(config.clone())?);
        Ok(Self {
            config,
            http_client,
            cancellation_token,
        })
    }

    fn ensure_not_cancelled(&self) -> AppResult<()> {
        if self.cancellation_token.is_cancelled() {
            Err(AppError::UserInterrupt)
        } else {
            Ok(())
        }
    }
}

/// 库的公共入口点，由 `main.rs` 调用。返回生成的 Anki 包路径。
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: CancellationToken) -> AppResult<PathBuf> {
    debug!("CLI 参数: {:?}", args);
    let config = AppConfig::new(&args)?;
    debug!("加载的应用配置: {:?}", config);
    let ctx = PipelineContext::new(config, cancellation_token)?;
    run_pipeline(ctx).await
}

/// 元数据 → 下载 → 转换 → 打包。
///
/// 单个文件的下载或转换失败只记入报告，不会中断后续阶段；
/// 中断或找不到 ffmpeg 则立即停止，且不会写出 Anki 包。
pub async fn run_pipeline(ctx: PipelineContext) -> AppResult<PathBuf> {
    let config = ctx.config.clone();

    ui::print_header(Stage::Metadata.label());
    let fetcher = HandbookFetcher::new(ctx.http_client.clone(), &config);
    let records = metadata::collect_sign_records(&fetcher, config.request_delay, &ctx.cancellation_token)
        .await
        .stage(Stage::Metadata)?;
    let notes = notes::build_notes(records, &config);
    info!("共生成 {} 张卡片", notes.len());
    ui::info(&format!("{} 件の手話を取得しました", notes.len()));

    tokio::fs::create_dir_all(&config.media_dir).await?;

    ctx.ensure_not_cancelled()?;
    if config.should_download {
        ui::print_header(Stage::Download.label());
        let manager = pipeline::run_download_stage(&ctx, &notes)
            .await
            .stage(Stage::Download)?;
        warn_partial_failure(&manager);
    } else {
        ui::info("ダウンロードをスキップします (既存の動画のみ使用)");
    }

    ctx.ensure_not_cancelled()?;
    if config.should_convert {
        ui::print_header(Stage::Convert.label());
        let manager = pipeline::run_convert_stage(&ctx, &notes)
            .await
            .stage(Stage::Convert)?;
        warn_partial_failure(&manager);
    } else {
        ui::info("変換をスキップします (元の動画をそのまま使用)");
    }

    ctx.ensure_not_cancelled()?;
    ui::print_header(Stage::Package.label());
    let package = package::assemble_package(&notes, &config);
    let writer = ApkgWriter::new(ctx.cancellation_token.clone());
    let output = config.output_path.clone();
    let spinner = ui::new_spinner("Ankiパッケージを書き込んでいます...");
    let written = tokio::task::spawn_blocking(move || {
        writer.write(&package, &output).map(|_| (package.decks.len(), package.note_count()))
    })
    .await
    .map_err(|e| AppError::Other(anyhow!("打包任务异常结束: {}", e)))
    .and_then(|r| r)
    .stage(Stage::Package);
    spinner.finish_and_clear();
    let (deck_count, note_count) = written?;

    let shown = dunce::canonicalize(&config.output_path).unwrap_or_else(|_| config.output_path.clone());
    ui::success(&format!(
        "{} を作成しました ({} デッキ, {} 枚のカード)",
        shown.display(),
        deck_count,
        note_count
    ));
    Ok(config.output_path.clone())
}

fn warn_partial_failure(manager: &StageManager) {
    if !manager.did_all_succeed() {
        ui::warn(&format!(
            "{}で {} 件が失敗しました。該当するカードはメディアなしで作成されます。",
            manager.name(),
            manager.get_stats().failed
        ));
    }
}

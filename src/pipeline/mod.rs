// src/pipeline/mod.rs

mod convert;
mod download;
pub mod ffmpeg;
pub mod profile;
mod task_runner;

pub use convert::{ConvertJob, MediaConverter};
pub use download::{AssetDownloader, DownloadJob};
pub use profile::EncodingProfile;
pub use task_runner::{Job, TaskRunner};

use crate::{
    PipelineContext,
    error::*,
    models::{JobStatus, Note},
    symbols, ui,
};
use colored::*;
use itertools::Itertools;
use log::info;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct StageStats {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 记录一个阶段内每个任务的结果，并在阶段结束时输出报告。
#[derive(Clone)]
pub struct StageManager {
    name: &'static str,
    stats: Arc<Mutex<StageStats>>,
    failed_jobs: Arc<Mutex<Vec<(String, String)>>>,
    skipped_jobs: Arc<Mutex<Vec<(String, String)>>>,
}

impl StageManager {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stats: Arc::new(Mutex::new(StageStats::default())),
            failed_jobs: Arc::new(Mutex::new(Vec::new())),
            skipped_jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn start_batch(&self, total_tasks: usize) {
        info!("[{}] 开始新一批任务，总数: {}", self.name, total_tasks);
        *self.stats.lock().unwrap() = StageStats {
            total: total_tasks,
            ..Default::default()
        };
        self.failed_jobs.lock().unwrap().clear();
        self.skipped_jobs.lock().unwrap().clear();
    }

    pub fn record(&self, label: &str, status: JobStatus) {
        if status.is_success() {
            self.stats.lock().unwrap().success += 1;
        } else if status.is_skip() {
            let (_, _, reason) = status.get_display_info();
            info!("[{}] 跳过 '{}'，原因: {}", self.name, label, reason);
            self.stats.lock().unwrap().skipped += 1;
            self.skipped_jobs
                .lock()
                .unwrap()
                .push((label.to_string(), reason.to_string()));
        } else {
            self.push_failure(label, status);
        }
    }

    pub fn record_failure(&self, label: &str, error: &AppError) {
        log::error!("[{}] '{}' 失败: {}", self.name, label, error);
        self.push_failure(label, JobStatus::from(error));
    }

    fn push_failure(&self, label: &str, status: JobStatus) {
        self.stats.lock().unwrap().failed += 1;
        let (_, _, msg) = status.get_display_info();
        self.failed_jobs
            .lock()
            .unwrap()
            .push((label.to_string(), msg.to_string()));
    }

    pub fn get_stats(&self) -> StageStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn failed_labels(&self) -> Vec<String> {
        self.failed_jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn did_all_succeed(&self) -> bool {
        self.stats.lock().unwrap().failed == 0
    }

    pub fn print_report(&self) {
        let stats = self.get_stats();
        let skipped = self.skipped_jobs.lock().unwrap();
        let failed = self.failed_jobs.lock().unwrap();
        info!(
            "[{}] 报告: Total={}, Success={}, Skipped={}, Failed={}",
            self.name, stats.total, stats.success, stats.skipped, stats.failed
        );

        if !skipped.is_empty() {
            // 跳过的文件可能很多，只按原因汇总数量
            let counts = skipped.iter().counts_by(|(_, reason)| reason.as_str());
            for (reason, count) in counts.into_iter().sorted() {
                println!("{} {}: {} 件", *symbols::SKIP, reason, count);
            }
        }
        if !failed.is_empty() {
            ui::print_sub_header(&format!("{}の詳細", self.name));
            println!("\n{} 失敗 ({}件):", *symbols::ERROR, stats.failed);
            print_grouped_report(&failed, |s| s.red());
        }
        if stats.total > 0 && stats.failed == 0 {
            println!(
                "{} {}: {} 件すべて完了 ({} 件スキップ)",
                *symbols::OK,
                self.name,
                stats.total,
                stats.skipped
            );
        } else if stats.total > 0 {
            println!(
                "{}: {} | {} | {}",
                self.name,
                format!("成功: {}", stats.success).green(),
                format!("失敗: {}", stats.failed).red(),
                format!("スキップ: {}", stats.skipped).yellow()
            );
        }
    }
}

fn print_grouped_report(
    items: &[(String, String)],
    color_fn: fn(ColoredString) -> ColoredString,
) {
    let mut grouped: HashMap<&String, Vec<&String>> = HashMap::new();
    for (label, reason) in items {
        grouped.entry(reason).or_default().push(label);
    }
    let mut sorted_reasons: Vec<_> = grouped.keys().copied().collect();
    sorted_reasons.sort();
    for reason in sorted_reasons {
        println!("  - {}", color_fn(format!("原因: {}", reason).into()));
        let mut labels = grouped.get(reason).cloned().unwrap_or_default();
        labels.sort();
        for label in labels {
            println!("    - {}", label);
        }
    }
}

/// 下载阶段：把每张卡片的原始视频下载到媒体目录。
pub async fn run_download_stage(ctx: &PipelineContext, notes: &[Note]) -> AppResult<StageManager> {
    let manager = StageManager::new("ダウンロード");
    let jobs: Vec<DownloadJob> = notes
        .iter()
        .map(|note| DownloadJob {
            url: note.video_url.clone(),
            dest: note.raw_video_path.clone(),
        })
        .collect();

    let downloader = AssetDownloader::new(ctx.http_client.clone(), ctx.cancellation_token.clone());
    let runner = TaskRunner::new(ctx.config.download_workers, ctx.cancellation_token.clone());
    runner
        .execute(jobs, &manager, |job: DownloadJob| {
            let downloader = downloader.clone();
            async move { downloader.download(&job.url, &job.dest).await }
        })
        .await?;
    manager.print_report();
    Ok(manager)
}

/// 转换阶段：对已经下载好的原始视频调用 ffmpeg。必须在下载阶段结束之后调用。
pub async fn run_convert_stage(ctx: &PipelineContext, notes: &[Note]) -> AppResult<StageManager> {
    let manager = StageManager::new("変換");
    let format = ctx.config.output_format;
    let jobs: Vec<ConvertJob> = notes
        .iter()
        .map(|note| ConvertJob {
            input: note.raw_video_path.clone(),
            output: note.output_media_path.clone(),
            format,
        })
        .collect();

    let converter = MediaConverter::from_config(&ctx.config, ctx.cancellation_token.clone());
    let runner = TaskRunner::new(ctx.config.convert_workers, ctx.cancellation_token.clone());
    runner
        .execute(jobs, &manager, |job: ConvertJob| {
            let converter = converter.clone();
            async move { converter.convert(&job.input, &job.output, job.format).await }
        })
        .await?;
    manager.print_report();
    Ok(manager)
}

// src/pipeline/task_runner.rs

use super::StageManager;
use crate::{constants, error::*, models::JobStatus, ui, utils};
use anyhow::anyhow;
use futures::FutureExt;
use indicatif::ProgressBar;
use log::{debug, error};
use std::{future::Future, panic::AssertUnwindSafe};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// 可以交给 `TaskRunner` 执行的独立任务。
pub trait Job: Send + 'static {
    /// 用于进度输出和报告的名称
    fn label(&self) -> String;
}

type JobOutput = (String, AppResult<JobStatus>);

/// 固定大小的工作池：同时最多运行 `workers` 个任务，其余任务排队等待。
///
/// 单个任务的失败只会被记录，不影响其他任务；致命错误和取消会立即结束整批任务。
pub struct TaskRunner {
    workers: usize,
    cancellation_token: CancellationToken,
}

impl TaskRunner {
    pub fn new(workers: usize, cancellation_token: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancellation_token,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn execute<J, F, Fut>(
        &self,
        jobs: Vec<J>,
        manager: &StageManager,
        job_fn: F,
    ) -> AppResult<()>
    where
        J: Job,
        F: Fn(J) -> Fut,
        Fut: Future<Output = AppResult<JobStatus>> + Send + 'static,
    {
        manager.start_batch(jobs.len());
        if self.cancellation_token.is_cancelled() {
            return Err(AppError::UserInterrupt);
        }
        if jobs.is_empty() {
            return Ok(());
        }

        ui::info(&format!(
            "{} 件の{}を開始します (並列数: {})...",
            jobs.len(),
            manager.name(),
            self.workers.min(jobs.len())
        ));
        let pbar = ui::new_tasks_progress_bar(jobs.len() as u64, manager.name());

        let mut pending = jobs.into_iter();
        let mut running: JoinSet<JobOutput> = JoinSet::new();
        for job in pending.by_ref().take(self.workers) {
            spawn_job(&mut running, job, &job_fn);
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    pbar.finish_and_clear();
                    debug!("收到取消信号，中止 {} 个运行中的任务", running.len());
                    abort_running(&mut running).await;
                    return Err(AppError::UserInterrupt);
                }
                joined = running.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            match joined {
                Ok((label, Ok(status))) => {
                    manager.record(&label, status);
                    print_result(&pbar, &label, status, None);
                }
                Ok((label, Err(e))) if e.is_fatal() => {
                    pbar.finish_and_clear();
                    error!("任务 '{}' 遇到致命错误，将中止整批任务: {}", label, e);
                    abort_running(&mut running).await;
                    return Err(e);
                }
                Ok((label, Err(e))) => {
                    manager.record_failure(&label, &e);
                    print_result(&pbar, &label, JobStatus::from(&e), Some(e.to_string()));
                }
                Err(join_err) => {
                    // 任务内部已捕获 panic，这里只会是被中止的任务
                    error!("任务异常结束: {}", join_err);
                }
            }
            pbar.inc(1);

            if let Some(job) = pending.next() {
                spawn_job(&mut running, job, &job_fn);
            }
        }

        pbar.finish_and_clear();
        Ok(())
    }
}

fn spawn_job<J, F, Fut>(running: &mut JoinSet<JobOutput>, job: J, job_fn: &F)
where
    J: Job,
    F: Fn(J) -> Fut,
    Fut: Future<Output = AppResult<JobStatus>> + Send + 'static,
{
    let label = job.label();
    let future = job_fn(job);
    running.spawn(async move {
        let result = AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(AppError::Other(anyhow!("任务发生 panic"))));
        (label, result)
    });
}

/// 中止所有运行中的任务，只等待中止本身完成（让任务的临时文件得以清理），不等待任务跑完。
async fn abort_running(running: &mut JoinSet<JobOutput>) {
    running.abort_all();
    while running.join_next().await.is_some() {}
}

fn print_result(pbar: &ProgressBar, label: &str, status: JobStatus, message: Option<String>) {
    if status.is_skip() {
        return;
    }
    let (symbol, color_fn, default_msg) = status.get_display_info();
    let label = utils::truncate_text(label, constants::FILENAME_TRUNCATE_LENGTH);
    let line = match message {
        Some(err_msg) => format!(
            "{} {} {}",
            symbol,
            label,
            color_fn(format!("失敗: {} (詳細: {})", default_msg, err_msg).into())
        ),
        None => format!("{} {}", symbol, label),
    };
    pbar.println(line);
}

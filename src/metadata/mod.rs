// src/metadata/mod.rs

mod cache;
pub mod handbook;

pub use cache::MetadataCache;
pub use handbook::HandbookFetcher;

use crate::{
    error::*,
    models::{Category, SignRecord},
    ui,
};
use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 手语元数据的来源
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn categories(&self) -> AppResult<Vec<Category>>;

    async fn signs_in(&self, category: &Category) -> AppResult<Vec<SignRecord>>;

    /// 本次请求是否需要访问网络（命中缓存时为 false，不需要等待间隔）。
    fn needs_network(&self, _category: &Category) -> bool {
        true
    }
}

/// 依次读取所有分类下的手语。分类之间保持固定的请求间隔。
pub async fn collect_sign_records(
    source: &dyn MetadataSource,
    request_delay: Duration,
    cancel: &CancellationToken,
) -> AppResult<Vec<SignRecord>> {
    let categories = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::UserInterrupt),
        result = source.categories() => result?,
    };
    info!("共 {} 个分类", categories.len());

    let pbar = ui::new_tasks_progress_bar(categories.len() as u64, "カテゴリ");
    let mut records = Vec::new();
    for category in &categories {
        if cancel.is_cancelled() {
            pbar.finish_and_clear();
            return Err(AppError::UserInterrupt);
        }
        if source.needs_network(category) && !request_delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    pbar.finish_and_clear();
                    return Err(AppError::UserInterrupt);
                }
                _ = tokio::time::sleep(request_delay) => {}
            }
        }
        let signs = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                pbar.finish_and_clear();
                return Err(AppError::UserInterrupt);
            }
            result = source.signs_in(category) => result?,
        };
        debug!("分类 '{}' 中有 {} 个手语", category.title, signs.len());
        records.extend(signs);
        pbar.inc(1);
    }
    pbar.finish_and_clear();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 第一个分类立即返回，之后的请求永远挂起
    struct StallingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataSource for StallingSource {
        async fn categories(&self) -> AppResult<Vec<Category>> {
            Ok(["1", "2"]
                .iter()
                .map(|id| Category {
                    id: id.to_string(),
                    title: format!("分類 {}", id),
                })
                .collect())
        }

        async fn signs_in(&self, _category: &Category) -> AppResult<Vec<SignRecord>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(Vec::new());
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_a_pending_category_fetch() {
        let source = StallingSource {
            calls: AtomicUsize::new(0),
        };
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            collect_sign_records(&source, Duration::ZERO, &token),
        )
        .await
        .expect("fetch should stop once cancelled");

        assert!(matches!(result, Err(AppError::UserInterrupt)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}

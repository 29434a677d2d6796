// src/metadata/handbook.rs

use super::{
    MetadataSource,
    cache::{CacheKey, MetadataCache},
};
use crate::{
    client::RobustClient,
    config::AppConfig,
    constants::site,
    error::*,
    models::{
        Category, SignRecord,
        api::{CollectionsPage, ModulePage, NextData},
    },
};
use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, info, warn};
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// 从 handbook.sign.town 的页面中读取分类与手语列表。
pub struct HandbookFetcher {
    http_client: Arc<RobustClient>,
    base_url: String,
    cache: MetadataCache,
    refresh: bool,
}

impl HandbookFetcher {
    pub fn new(http_client: Arc<RobustClient>, config: &AppConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.clone(),
            cache: MetadataCache::new(&config.cache_dir),
            refresh: config.refresh_metadata,
        }
    }

    pub fn collections_url(&self) -> AppResult<Url> {
        page_url(&self.base_url, &format!("{}/collections", site::LOCALE))
    }

    pub fn module_url(&self, category_id: &str) -> AppResult<Url> {
        page_url(
            &self.base_url,
            &format!("{}/collections/module/{}", site::LOCALE, category_id),
        )
    }

    /// 返回页面数据，以及它是否来自本地缓存。
    async fn load_payload(&self, key: CacheKey<'_>, url: &Url) -> AppResult<(String, bool)> {
        if !self.refresh {
            if let Some(cached) = self.cache.load(key)? {
                return Ok((cached, true));
            }
        }
        let payload = self.fetch_payload(key, url).await?;
        Ok((payload, false))
    }

    async fn fetch_payload(&self, key: CacheKey<'_>, url: &Url) -> AppResult<String> {
        info!("请求页面: {}", url);
        let html = self.http_client.get_text(url.clone()).await?;
        let payload = extract_next_data(&html, url.as_str())?;
        self.cache.store(key, &payload)?;
        Ok(payload)
    }

    /// 解析失败时，如果数据来自缓存，则丢弃缓存并重新请求一次。
    async fn load_parsed<T: DeserializeOwned>(&self, key: CacheKey<'_>, url: &Url) -> AppResult<T> {
        let (payload, from_cache) = self.load_payload(key, url).await?;
        match parse_payload::<T>(&payload, url.as_str()) {
            Ok(parsed) => Ok(parsed),
            Err(e) if from_cache => {
                warn!("缓存 {:?} 无法解析 ({})，重新获取。", key, e);
                self.cache.remove(key)?;
                let payload = self.fetch_payload(key, url).await?;
                parse_payload::<T>(&payload, url.as_str())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MetadataSource for HandbookFetcher {
    async fn categories(&self) -> AppResult<Vec<Category>> {
        let url = self.collections_url()?;
        let page: NextData<CollectionsPage> = self.load_parsed(CacheKey::Categories, &url).await?;
        Ok(page
            .props
            .page_props
            .initial_data
            .into_iter()
            .map(|c| Category {
                id: c.id.to_string(),
                title: c.title,
            })
            .collect())
    }

    async fn signs_in(&self, category: &Category) -> AppResult<Vec<SignRecord>> {
        let url = self.module_url(&category.id)?;
        let page: NextData<ModulePage> = self
            .load_parsed(CacheKey::Category(&category.id), &url)
            .await?;
        Ok(validate_signs(page.props.page_props, category))
    }

    fn needs_network(&self, category: &Category) -> bool {
        self.refresh || !self.cache.contains(CacheKey::Category(&category.id))
    }
}

/// `{base}/{path}?sl=JSL`
pub fn page_url(base_url: &str, path: &str) -> AppResult<Url> {
    let mut url = Url::parse(&format!("{}/{}", base_url.trim_end_matches('/'), path))?;
    url.query_pairs_mut().append_pair("sl", site::SIGN_LANGUAGE);
    Ok(url)
}

/// 提取 Next.js 页面中 `<script id="__NEXT_DATA__">` 的内容。
pub fn extract_next_data(html: &str, url: &str) -> AppResult<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(site::NEXT_DATA_SELECTOR)
        .map_err(|e| AppError::Other(anyhow!("无效的选择器: {:?}", e)))?;
    let payload = document
        .select(&selector)
        .next()
        .map(|script| script.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::MetadataMissing {
            url: url.to_string(),
            what: "__NEXT_DATA__",
        })?;
    debug!("从 {} 提取到 {} 字节的页面数据", url, payload.len());
    Ok(payload)
}

fn parse_payload<T: DeserializeOwned>(payload: &str, url: &str) -> AppResult<T> {
    serde_json::from_str(payload).map_err(|source| AppError::PayloadParseFailed {
        url: url.to_string(),
        source,
    })
}

/// 把页面中的手语条目校验为 `SignRecord`。缺少日语释义或视频地址的条目会被跳过。
fn validate_signs(page: ModulePage, category: &Category) -> Vec<SignRecord> {
    page.module_data
        .sign_list
        .into_iter()
        .filter_map(|sign| {
            let id = sign.id.to_string();
            let definition = sign
                .sign_definitions
                .get(site::LOCALE)
                .and_then(|defs| defs.first())
                .cloned();
            let (Some(definition), Some(video_url)) = (definition, sign.default_video_url) else {
                warn!("手语 '{}' 缺少释义或视频地址，已跳过", id);
                return None;
            };
            if video_url.trim().is_empty() {
                warn!("手语 '{}' 的视频地址为空，已跳过", id);
                return None;
            }
            Some(SignRecord {
                id,
                definition: definition.def,
                position: definition.pos.unwrap_or_default(),
                video_source_url: video_url,
                category: category.title.clone(),
                category_id: category.id.clone(),
            })
        })
        .collect()
}

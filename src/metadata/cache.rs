// src/metadata/cache.rs

use crate::{error::*, utils};
use log::debug;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// 缓存键：分类一览，或某个分类的手语列表。
#[derive(Debug, Clone, Copy)]
pub enum CacheKey<'a> {
    Categories,
    Category(&'a str),
}

/// 把页面中提取出的原始 JSON 按分类 id 保存在本地，后续运行不再访问网络。
#[derive(Debug, Clone)]
pub struct MetadataCache {
    dir: PathBuf,
}

impl MetadataCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: CacheKey<'_>) -> PathBuf {
        match key {
            CacheKey::Categories => self.dir.join("categories.json"),
            CacheKey::Category(id) => self
                .dir
                .join(format!("category-{}.json", utils::sanitize_filename(id))),
        }
    }

    pub fn contains(&self, key: CacheKey<'_>) -> bool {
        self.path_for(key).is_file()
    }

    pub fn load(&self, key: CacheKey<'_>) -> AppResult<Option<String>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        debug!("读取缓存: {}", path.display());
        Ok(Some(fs::read_to_string(path)?))
    }

    /// 先写临时文件再重命名，避免留下写了一半的缓存。
    pub fn store(&self, key: CacheKey<'_>, payload: &str) -> AppResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let mut staging = tempfile::Builder::new()
            .prefix(".cache-")
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        staging.write_all(payload.as_bytes())?;
        staging.flush()?;
        staging.persist(&path)?;
        debug!("写入缓存: {}", path.display());
        Ok(())
    }

    pub fn remove(&self, key: CacheKey<'_>) -> AppResult<()> {
        let path = self.path_for(key);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load_round_trip_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path().join("_metadata"));

        assert!(cache.load(CacheKey::Category("12")).unwrap().is_none());
        cache.store(CacheKey::Category("12"), r#"{"a":1}"#).unwrap();
        cache.store(CacheKey::Categories, "[]").unwrap();

        assert!(cache.contains(CacheKey::Category("12")));
        assert!(!cache.contains(CacheKey::Category("13")));
        assert_eq!(cache.load(CacheKey::Category("12")).unwrap().as_deref(), Some(r#"{"a":1}"#));

        // 目录中只剩下最终文件，没有临时文件
        let names: Vec<String> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.ends_with(".part")));

        cache.remove(CacheKey::Category("12")).unwrap();
        assert!(!cache.contains(CacheKey::Category("12")));
    }
}

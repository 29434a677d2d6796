// src/notes.rs

use crate::{
    config::AppConfig,
    constants::site,
    models::{Note, SignRecord, raw_file_name},
    utils,
};
use log::warn;
use std::collections::{HashMap, hash_map::Entry};

/// 把手语条目转换为卡片。同一个手语出现在多个分类中时只保留第一次出现。
///
/// 文件名由清理后的 id 决定，所以按清理后的 id 去重：`a/b` 和 `a_b` 会指向同一个文件，
/// 只保留先出现的那个。
pub fn build_notes(records: Vec<SignRecord>, config: &AppConfig) -> Vec<Note> {
    let mut seen: HashMap<String, String> = HashMap::new();
    records
        .into_iter()
        .filter(|record| match seen.entry(utils::sanitize_filename(&record.id)) {
            Entry::Vacant(slot) => {
                slot.insert(record.id.clone());
                true
            }
            Entry::Occupied(slot) if slot.get() == &record.id => {
                warn!("手语 '{}' 重复出现于分类 '{}'，已忽略", record.id, record.category);
                false
            }
            Entry::Occupied(slot) => {
                warn!(
                    "手语 '{}' 与 '{}' 的文件名相同 ({})，已忽略",
                    record.id,
                    slot.get(),
                    slot.key()
                );
                false
            }
        })
        .map(|record| build_note(record, config))
        .collect()
}

pub fn build_note(record: SignRecord, config: &AppConfig) -> Note {
    let file_stem = utils::sanitize_filename(&record.id);
    Note {
        page_url: format!(
            "{}/{}/signs/{}?sl={}",
            config.base_url,
            site::LOCALE,
            record.id,
            site::SIGN_LANGUAGE
        ),
        raw_video_path: config.media_dir.join(raw_file_name(&file_stem)),
        output_media_path: config
            .media_dir
            .join(config.output_format.file_name(&file_stem)),
        id: record.id,
        definition: record.definition,
        position: record.position,
        category: record.category,
        video_url: record.video_source_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutputFormat;
    use std::path::PathBuf;

    fn record(id: &str, category: &str) -> SignRecord {
        SignRecord {
            id: id.into(),
            definition: "ありがとう".into(),
            position: "名詞".into(),
            video_source_url: format!("https://cdn.example/{}.mp4", id),
            category: category.into(),
            category_id: "1".into(),
        }
    }

    #[test]
    fn test_paths_are_derived_from_id_and_format() {
        let config = AppConfig {
            media_dir: PathBuf::from("media"),
            output_format: OutputFormat::VideoVp9,
            ..AppConfig::default()
        };
        let note = build_note(record("abc", "あいさつ"), &config);
        assert_eq!(note.raw_video_path, PathBuf::from("media/abc.raw.mp4"));
        assert_eq!(note.output_media_path, PathBuf::from("media/abc.webm"));
        assert_eq!(note.page_url, "https://handbook.sign.town/ja/signs/abc?sl=JSL");

        // 相同配置下重复构造得到相同路径
        let again = build_note(record("abc", "あいさつ"), &config);
        assert_eq!(note, again);
    }

    #[test]
    fn test_unsafe_ids_are_sanitized_for_paths_only() {
        let config = AppConfig {
            media_dir: PathBuf::from("media"),
            ..AppConfig::default()
        };
        let note = build_note(record("a/b", "x"), &config);
        assert_eq!(note.id, "a/b");
        assert_eq!(note.output_media_path, PathBuf::from("media/a_b.webp"));
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let config = AppConfig::default();
        let notes = build_notes(
            vec![record("a", "x"), record("b", "x"), record("a", "y")],
            &config,
        );
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].category, "x");
    }

    #[test]
    fn test_ids_sharing_a_file_name_keep_the_first() {
        let config = AppConfig {
            media_dir: PathBuf::from("media"),
            ..AppConfig::default()
        };
        let notes = build_notes(
            vec![record("a/b", "x"), record("a_b", "y"), record("c", "y")],
            &config,
        );
        let ids: Vec<_> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["a/b", "c"]);

        let paths: std::collections::HashSet<_> = notes.iter().map(|n| &n.output_media_path).collect();
        assert_eq!(paths.len(), notes.len());
    }
}

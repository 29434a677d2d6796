// src/package/mod.rs

mod apkg;
pub mod templates;

pub use apkg::ApkgWriter;
pub use templates::CardTemplate;

use crate::{
    config::AppConfig,
    constants,
    error::AppResult,
    models::{MediaKind, Note},
    utils,
};
use log::{debug, warn};
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

/// 笔记类型的字段，顺序即 Anki 中的字段顺序
pub const FIELDS: [&str; 8] = [
    "id",
    "def",
    "pos",
    "media",
    "media_tag",
    "video_url",
    "page_url",
    "category",
];

/// 排序字段：释义
pub const SORT_FIELD: usize = 1;

#[derive(Debug, Clone)]
pub struct NoteModel {
    pub id: i64,
    pub name: String,
    pub kind: MediaKind,
    pub templates: Vec<CardTemplate>,
    pub css: &'static str,
}

impl NoteModel {
    pub fn new(config: &AppConfig, kind: MediaKind) -> Self {
        let kind_name = match kind {
            MediaKind::Video => "動画",
            MediaKind::Image => "画像",
        };
        let name = format!("{} ({})", constants::DECK_ROOT_NAME, kind_name);
        Self {
            id: utils::stable_id(&format!("model:{}:{:?}", name, config.template_variant)),
            templates: templates::card_templates(config.template_variant, kind),
            name,
            kind,
            css: templates::STYLE_CSS,
        }
    }
}

/// 写入包中的一条笔记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedNote {
    pub guid: String,
    pub fields: Vec<String>,
}

impl PackagedNote {
    pub fn sort_field(&self) -> &str {
        &self.fields[SORT_FIELD]
    }

    pub fn first_field(&self) -> &str {
        &self.fields[0]
    }
}

#[derive(Debug, Clone)]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub notes: Vec<PackagedNote>,
}

impl Deck {
    fn new(category: &str) -> Self {
        let name = format!("{}::{}", constants::DECK_ROOT_NAME, category);
        Self {
            id: utils::stable_id(&format!("deck:{}", name)),
            name,
            notes: Vec::new(),
        }
    }
}

/// 组装好、等待写出的 Anki 包
#[derive(Debug, Clone)]
pub struct Package {
    pub model: NoteModel,
    pub decks: Vec<Deck>,
    pub media_files: Vec<PathBuf>,
}

impl Package {
    pub fn note_count(&self) -> usize {
        self.decks.iter().map(|d| d.notes.len()).sum()
    }
}

/// 把包写到磁盘上的某种格式
pub trait PackageWriter {
    fn write(&self, package: &Package, dest: &Path) -> AppResult<()>;
}

/// 按分类分组生成牌组，并收集实际存在的媒体文件。
///
/// 转换关闭时卡片直接引用原始视频。媒体文件不存在的笔记仍会写入，只是没有媒体。
pub fn assemble_package(notes: &[Note], config: &AppConfig) -> Package {
    let converted = config.should_convert;
    let kind = if converted {
        config.output_format.kind()
    } else {
        MediaKind::Video
    };
    let model = NoteModel::new(config, kind);

    let mut decks: Vec<Deck> = Vec::new();
    let mut deck_index: HashMap<&str, usize> = HashMap::new();
    let mut media_files = Vec::new();
    let mut seen_media = HashSet::new();
    let mut missing = 0usize;

    for note in notes {
        let media_path = note.media_path(converted);
        let media_name = if media_path.is_file() {
            if seen_media.insert(media_path.to_path_buf()) {
                media_files.push(media_path.to_path_buf());
            }
            media_path.file_name().map(|n| n.to_string_lossy().into_owned())
        } else {
            debug!("'{}' 没有可用的媒体文件: {}", note.id, media_path.display());
            missing += 1;
            None
        };

        let index = *deck_index.entry(note.category.as_str()).or_insert_with(|| {
            decks.push(Deck::new(&note.category));
            decks.len() - 1
        });
        decks[index].notes.push(PackagedNote {
            guid: utils::md5_hex(&format!("signtown:{}", note.id)),
            fields: vec![
                note.id.clone(),
                note.definition.clone(),
                note.position.clone(),
                media_name.clone().unwrap_or_default(),
                templates::media_tag(kind, media_name.as_deref()),
                note.video_url.clone(),
                note.page_url.clone(),
                note.category.clone(),
            ],
        });
    }

    if missing > 0 {
        warn!("{} 件のカードにメディアがありません", missing);
    }
    Package {
        model,
        decks,
        media_files,
    }
}

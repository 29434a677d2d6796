// src/package/templates.rs

use crate::models::{MediaKind, TemplateVariant};

pub const STYLE_CSS: &str = include_str!("../../templates/style.css");

const JA2JSL_FRONT: &str = include_str!("../../templates/ja2jsl_front.html");
const JA2JSL_BACK: &str = include_str!("../../templates/ja2jsl_back.html");
const JSL2JA_FRONT: &str = include_str!("../../templates/jsl2ja_front.html");
const JSL2JA_BACK: &str = include_str!("../../templates/jsl2ja_back.html");

const KIND_PLACEHOLDER: &str = "%KIND%";

/// 一种卡片（正面/背面）模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTemplate {
    pub name: &'static str,
    pub front: String,
    pub back: String,
}

impl CardTemplate {
    fn new(name: &'static str, front: &str, back: &str, kind: MediaKind) -> Self {
        let class = kind_class(kind);
        Self {
            name,
            front: front.replace(KIND_PLACEHOLDER, class),
            back: back.replace(KIND_PLACEHOLDER, class),
        }
    }

    /// 正面引用到的字段，用于生成 Anki 的 `req`
    pub fn front_field_indices(&self, fields: &[&str]) -> Vec<usize> {
        fields
            .iter()
            .enumerate()
            .filter(|(_, name)| {
                self.front.contains(&format!("{{{{{}}}}}", name))
                    || self.front.contains(&format!("{{{{#{}}}}}", name))
            })
            .map(|(i, _)| i)
            .collect()
    }
}

fn kind_class(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "video",
        MediaKind::Image => "image",
    }
}

pub fn card_templates(variant: TemplateVariant, kind: MediaKind) -> Vec<CardTemplate> {
    let ja2jsl = || CardTemplate::new("日本語→手話", JA2JSL_FRONT, JA2JSL_BACK, kind);
    let jsl2ja = || CardTemplate::new("手話→日本語", JSL2JA_FRONT, JSL2JA_BACK, kind);
    match variant {
        TemplateVariant::Ja2Jsl => vec![ja2jsl()],
        TemplateVariant::Jsl2Ja => vec![jsl2ja()],
        TemplateVariant::Both => vec![ja2jsl(), jsl2ja()],
    }
}

/// 卡片里嵌入媒体的 HTML。没有媒体文件时为空。
pub fn media_tag(kind: MediaKind, file_name: Option<&str>) -> String {
    let Some(name) = file_name else {
        return String::new();
    };
    let name = name.replace('&', "&amp;").replace('"', "&quot;");
    match kind {
        MediaKind::Image => format!("<img src=\"{}\">", name),
        MediaKind::Video => format!(
            "<video src=\"{}\" autoplay loop muted playsinline></video>",
            name
        ),
    }
}

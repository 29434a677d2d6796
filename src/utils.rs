// src/utils.rs

use crate::constants;
use md5::{Digest, Md5};
use regex::Regex;
use sha1::Sha1;
use std::{ffi::OsStr, path::Path, sync::LazyLock};

static ILLEGAL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// 清理用作文件名的字符串（手语 id 会直接成为媒体文件名）。
pub fn sanitize_filename(name: &str) -> String {
    let original_name = name.trim();
    if original_name.is_empty() {
        return "unknown".to_string();
    }

    let stem = Path::new(original_name)
        .file_stem()
        .unwrap_or_else(|| OsStr::new(original_name))
        .to_string_lossy()
        .to_uppercase();
    let windows_reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    let mut name = if windows_reserved.contains(&stem.as_ref()) {
        format!("_{}", original_name)
    } else {
        original_name.to_string()
    };

    name = ILLEGAL_CHARS_RE.replace_all(&name, "_").into_owned();
    name = WHITESPACE_RE.replace_all(&name, "_").into_owned();
    name = name.trim_matches('.').to_string();
    if name.is_empty() {
        return "unnamed".to_string();
    }
    safe_truncate_utf8(&name, constants::MAX_FILENAME_BYTES).to_string()
}

fn safe_truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut i = max_bytes;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    &s[..i]
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 {
        text.to_string()
    } else {
        format!("{}...", &text[..end_pos])
    }
}

pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// 由名称生成稳定的 Anki 对象 id，范围与 Anki 自身随机生成的一致。
pub fn stable_id(name: &str) -> i64 {
    let digest = Md5::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(bytes) % (1 << 30);
    (value + (1 << 30)) as i64
}

/// Anki 的字段校验和：去掉 HTML 后的首字段 sha1 的前 8 位十六进制。
pub fn field_checksum(field: &str) -> i64 {
    let stripped = HTML_TAG_RE.replace_all(field, "");
    let digest = Sha1::digest(stripped.as_bytes());
    let hex = hex::encode(&digest[..4]);
    i64::from_str_radix(&hex, 16).unwrap_or(0)
}

// tests/common/mod.rs

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// 把 JSON 包进 Next.js 页面
pub fn next_page(page_props: serde_json::Value) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>手話タウン</title></head><body><div id="__next"></div><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        serde_json::json!({ "props": { "pageProps": page_props } })
    )
}

pub fn collections_page(categories: &[(&str, &str)]) -> String {
    let data: Vec<_> = categories
        .iter()
        .map(|(id, title)| serde_json::json!({ "id": id, "title": title }))
        .collect();
    next_page(serde_json::json!({ "initialData": data }))
}

/// `signs`: (id, 释义, 视频地址)
pub fn module_page(signs: &[(String, String, String)]) -> String {
    let list: Vec<_> = signs
        .iter()
        .map(|(id, def, video)| {
            serde_json::json!({
                "id": id,
                "signDefinitions": { "ja": [{ "def": def, "pos": "名詞" }] },
                "defaultVideoUrl": video
            })
        })
        .collect();
    next_page(serde_json::json!({ "moduleData": { "signList": list } }))
}

/// 用 shell 脚本代替 ffmpeg：把输入复制到输出，并把每次调用记录到输出目录的 `ffmpeg-calls.log`。
/// 输入文件名包含 `broken` 时以非零状态退出，包含 `slow` 时先睡眠。
#[cfg(unix)]
pub fn write_fake_ffmpeg(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    let script = r#"#!/bin/sh
prev=""
input=""
output=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  prev="$arg"
  output="$arg"
done
echo "$input" >> "$(dirname "$output")/ffmpeg-calls.log"
case "$input" in
  *slow*) sleep 30 ;;
esac
case "$input" in
  *broken*) echo "$input: Invalid data found when processing input" >&2; exit 1 ;;
esac
cp "$input" "$output"
"#;
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// 整个测试进程共用一个假 ffmpeg：ffmpeg 的路径在进程内只解析一次。
#[cfg(unix)]
pub fn shared_fake_ffmpeg() -> PathBuf {
    use std::sync::OnceLock;
    static FAKE: OnceLock<PathBuf> = OnceLock::new();
    FAKE.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("signtown-fake-ffmpeg-{}", std::process::id()));
        write_fake_ffmpeg(&dir)
    })
    .clone()
}

pub fn ffmpeg_calls(media_dir: &Path) -> usize {
    std::fs::read_to_string(media_dir.join("ffmpeg-calls.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// 目录中以 `.part` 结尾或包含 `.part.` 的临时文件
pub fn staging_leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    let name = p.file_name().unwrap().to_string_lossy().into_owned();
                    name.ends_with(".part") || name.contains(".part.")
                })
                .collect()
        })
        .unwrap_or_default()
}

// src/pipeline/ffmpeg.rs

use crate::{config::external::get_config_dir, constants};
use log::{debug, info, warn};
use std::{
    env,
    path::{Path, PathBuf},
    sync::OnceLock,
};

static FFMPEG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

/// 查找 ffmpeg。整个进程只查找一次，之后复用结果。
///
/// 顺序：配置文件中指定的路径 → PATH 中的系统版本 → 程序旁或配置目录 `bin/` 下的附带版本。
pub fn resolve_ffmpeg(configured: Option<&Path>) -> Option<&'static Path> {
    FFMPEG_PATH
        .get_or_init(|| {
            let found = locate(configured);
            match &found {
                Some(path) => info!("使用 ffmpeg: {}", path.display()),
                None => warn!("未找到 ffmpeg 可执行文件"),
            }
            found
        })
        .as_deref()
}

fn locate(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if is_executable(path) {
            return Some(path.to_path_buf());
        }
        warn!("配置的 ffmpeg 路径不存在或不可执行: {}", path.display());
    }
    find_in_path(&executable_name()).or_else(find_bundled)
}

pub fn executable_name() -> String {
    format!("{}{}", constants::FFMPEG_BIN, env::consts::EXE_SUFFIX)
}

/// 在 PATH 中查找可执行文件
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// 普通文件，且在 Unix 上至少有一个执行位。
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn bundled_candidates() -> Vec<PathBuf> {
    let name = executable_name();
    let mut candidates = Vec::new();
    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join(&name));
        candidates.push(exe_dir.join(constants::BUNDLED_TOOLS_DIR).join(&name));
    }
    if let Ok(config_dir) = get_config_dir() {
        candidates.push(config_dir.join(constants::BUNDLED_TOOLS_DIR).join(&name));
    }
    candidates
}

fn find_bundled() -> Option<PathBuf> {
    let found = bundled_candidates().into_iter().find(|p| is_executable(p));
    if let Some(path) = &found {
        debug!("系统中没有 ffmpeg，使用附带版本: {}", path.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_path_misses_unknown_binary() {
        assert!(find_in_path("definitely-not-a-real-binary-4f1c").is_none());
    }

    #[cfg(unix)]
    fn write_script(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, b"#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_configured_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join(executable_name());
        #[cfg(unix)]
        write_script(&fake, 0o755);
        #[cfg(not(unix))]
        std::fs::write(&fake, b"").unwrap();
        assert_eq!(locate(Some(&fake)), Some(fake.clone()));
    }

    #[cfg(unix)]
    #[test]
    fn test_files_without_execute_bit_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        write_script(&plain, 0o644);
        let runnable = dir.path().join("runnable");
        write_script(&runnable, 0o755);

        assert!(!is_executable(&plain));
        assert!(is_executable(&runnable));
        assert!(!is_executable(dir.path()));
    }

    #[test]
    fn test_bundled_candidates_use_platform_name() {
        let name = executable_name();
        assert!(
            bundled_candidates()
                .iter()
                .all(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == name))
        );
    }
}

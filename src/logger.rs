// src/logger.rs

use crate::{cli::LogLevel, config::external::get_config_dir, constants};
use log::warn;
use std::{env, path::PathBuf};

fn log_file_path() -> PathBuf {
    match get_config_dir() {
        Ok(dir) => dir.join(constants::LOG_FILE_NAME),
        Err(_) => {
            eprintln!("警告: ホームディレクトリが見つからないため、ログは一時ディレクトリに書き込まれます。");
            env::temp_dir()
                .join(clap::crate_name!())
                .join(constants::LOG_FILE_NAME)
        }
    }
}

/// 文件日志。默认关闭，只有指定 `--log-level` 时才写入。
pub fn init_logger(level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }

    let log_path = log_file_path();
    if let Some(dir) = log_path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("警告: ログディレクトリ {:?} を作成できません: {}", dir, e);
        }
    }

    let file_appender = match fern::log_file(&log_path) {
        Ok(file) => file,
        Err(e) => {
            let fallback_path = env::temp_dir().join(format!(
                "{}-{}",
                clap::crate_name!(),
                constants::LOG_FALLBACK_FILE_NAME
            ));
            eprintln!(
                "警告: ログファイル {:?} を開けません ({})。{:?} を使用します。",
                log_path, e, fallback_path
            );
            match fern::log_file(&fallback_path) {
                Ok(file) => {
                    warn!("日志写入备用文件: {:?}", fallback_path);
                    file
                }
                Err(e) => {
                    eprintln!("エラー: ログファイルを作成できません: {}", e);
                    return;
                }
            }
        }
    };

    let result = fern::Dispatch::new()
        .level(level.into())
        // 第三方库的调试日志太多
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Info)
        .level_for("html5ever", log::LevelFilter::Warn)
        .level_for("selectors", log::LevelFilter::Warn)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file_appender)
        .apply();

    if let Err(e) = result {
        eprintln!("警告: ログの初期化に失敗しました: {}", e);
    }
}

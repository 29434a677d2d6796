// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use signtown_anki::{cli::Cli, error::AppError, logger, run_from_cli, symbols, ui};
use std::{env, sync::Arc};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| clap::crate_name!().to_string());
    let after_help = format!(
        "例:\n  # 既定の設定でパッケージを作成 (WebPアニメーション)\n  {bin}\n\n  # 動画(H.264)のまま、両方向のカードを作成\n  {bin} -f video-h264 -t both\n\n  # ダウンロード済みの動画だけで作り直す\n  {bin} --no-download -o out.apkg",
        bin = bin_name
    );
    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };
    logger::init_logger(args.log_level);

    // 第一次 Ctrl+C 让正在运行的任务收尾；第二次直接退出
    let cancellation_token = CancellationToken::new();
    let token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        println!("\n{} 中断しています... (もう一度 {} で強制終了)", *symbols::WARN, *symbols::CTRL_C);
        log::warn!("收到 Ctrl+C，正在取消任务");
        token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    if let Err(e) = run_from_cli(args, cancellation_token).await {
        log::error!("程序执行出错: {}", e);
        if e.is_interrupt() {
            eprintln!("\n{} {}", *symbols::WARN, "ユーザーにより中断されました。".yellow());
            std::process::exit(130);
        }
        eprintln!();
        let message = match &e {
            AppError::Stage { stage, source } => format!("{}に失敗しました: {}", stage.label(), source),
            other => format!("エラーが発生しました: {}", other),
        };
        ui::error(&message);
        std::process::exit(1);
    }
}

// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const FILENAME_TRUNCATE_LENGTH: usize = 50;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_BASE_URL: &str = "https://handbook.sign.town";
pub const DEFAULT_MEDIA_DIR: &str = "collection.media";
pub const DEFAULT_PACKAGE_NAME: &str = "手話タウンハンドブック.apkg";
pub const DECK_ROOT_NAME: &str = "手話タウンハンドブック";
pub const METADATA_CACHE_DIR: &str = "_metadata";
pub const REQUEST_DELAY_MS: u64 = 200;

/// 下载属于网络密集型任务，允许比转码更高的并发。
pub const MAX_DOWNLOAD_WORKERS: usize = 8;
pub const MAX_CONVERT_WORKERS: usize = 4;

pub const FFMPEG_BIN: &str = "ffmpeg";
pub const BUNDLED_TOOLS_DIR: &str = "bin";

pub mod site {
    pub const LOCALE: &str = "ja";
    pub const SIGN_LANGUAGE: &str = "JSL";
    pub const NEXT_DATA_SELECTOR: &str = "script#__NEXT_DATA__";
}

pub mod media {
    pub const RAW_SUFFIX: &str = "raw.mp4";
    pub const ANIMATION_FPS: u32 = 12;
    pub const ANIMATION_WIDTH: u32 = 320;
}

// src/pipeline/profile.rs

use crate::{constants::media, models::OutputFormat};
use std::{ffi::OsString, path::Path};

/// 质量参数：视频编码器用 CRF，WebP 用 0-100 的 quality。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Crf(u8),
    Quality(u8),
}

/// 一种输出格式对应的固定 ffmpeg 参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProfile {
    pub codec: &'static str,
    pub muxer: &'static str,
    pub quality: Quality,
    pub frame_rate: Option<u32>,
    pub width: Option<u32>,
    pub strip_audio: bool,
    pub extra: &'static [&'static str],
}

impl EncodingProfile {
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::VideoH264 => Self {
                codec: "libx264",
                muxer: "mp4",
                quality: Quality::Crf(28),
                frame_rate: None,
                width: None,
                strip_audio: true,
                extra: &["-preset", "veryfast", "-pix_fmt", "yuv420p", "-movflags", "+faststart"],
            },
            OutputFormat::VideoVp9 => Self {
                codec: "libvpx-vp9",
                muxer: "webm",
                quality: Quality::Crf(40),
                frame_rate: None,
                width: None,
                strip_audio: true,
                extra: &["-b:v", "0", "-row-mt", "1", "-deadline", "good", "-cpu-used", "4"],
            },
            OutputFormat::ImageWebp => Self {
                codec: "libwebp_anim",
                muxer: "webp",
                quality: Quality::Quality(60),
                frame_rate: Some(media::ANIMATION_FPS),
                width: Some(media::ANIMATION_WIDTH),
                strip_audio: true,
                extra: &["-loop", "0", "-compression_level", "4"],
            },
            OutputFormat::ImageAv1 => Self {
                codec: "libaom-av1",
                muxer: "avif",
                quality: Quality::Crf(35),
                frame_rate: Some(media::ANIMATION_FPS),
                width: Some(media::ANIMATION_WIDTH),
                strip_audio: true,
                extra: &["-b:v", "0", "-cpu-used", "6", "-row-mt", "1", "-pix_fmt", "yuv420p"],
            },
        }
    }

    /// 动图格式的滤镜链：降帧率并缩放宽度
    pub fn filter_chain(&self) -> Option<String> {
        let mut filters = Vec::new();
        if let Some(fps) = self.frame_rate {
            filters.push(format!("fps={}", fps));
        }
        if let Some(width) = self.width {
            filters.push(format!("scale={}:-2", width));
        }
        (!filters.is_empty()).then(|| filters.join(","))
    }

    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        if let Some(filter) = self.filter_chain() {
            args.push("-vf".into());
            args.push(filter.into());
        }
        if self.strip_audio {
            args.push("-an".into());
        }
        args.push("-c:v".into());
        args.push(self.codec.into());
        match self.quality {
            Quality::Crf(crf) => {
                args.push("-crf".into());
                args.push(crf.to_string().into());
            }
            Quality::Quality(q) => {
                args.push("-quality".into());
                args.push(q.to_string().into());
            }
        }
        args.extend(self.extra.iter().map(OsString::from));
        args.push("-f".into());
        args.push(self.muxer.into());
        args.push(output.as_os_str().to_owned());
        args
    }
}

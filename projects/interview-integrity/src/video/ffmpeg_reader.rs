use super::{DecodedFrame, VideoReader};
use anyhow::{anyhow, bail, Context, Result};
use opencv::{core, prelude::*};
use std::path::Path;

use ffmpeg_next::ffi;

/// Video reader backed by FFmpeg via ffmpeg-next.
///
/// Timestamps come from each frame's best-effort PTS in the stream time base,
/// so variable frame rate recordings (browser uploads, mostly) are sampled on
/// their real timeline. The demuxer and decoder are released when the reader
/// is dropped.
pub struct FfmpegReader {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    /// Lazily created on first frame (source format is only known then).
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    source_fps: f64,
    total_frames: usize,
    frames_decoded: usize,
    time_base: ffmpeg_next::Rational,
    start_pts: Option<i64>,
    reuse_packet: ffmpeg_next::codec::packet::Packet,
    /// Whether we've sent EOF to the decoder.
    eof_sent: bool,
}

// SAFETY: an FfmpegReader is owned by exactly one analysis run and never shared;
// the raw pointers inside ffmpeg-next types do not escape it.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new(path: &Path) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        if !path.exists() {
            bail!("Video file not found: {}", path.display());
        }

        let input_ctx = ffmpeg_next::format::input(&path)
            .with_context(|| format!("Failed to open video file: {}", path.display()))?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;

        let video_stream_index = video_stream.index();

        let rational_fps = video_stream.avg_frame_rate();
        let source_fps = if rational_fps.denominator() > 0 && rational_fps.numerator() > 0 {
            rational_fps.numerator() as f64 / rational_fps.denominator() as f64
        } else {
            tracing::warn!("FfmpegReader: could not determine FPS, defaulting to 30.0");
            30.0
        };

        let time_base = video_stream.time_base();
        let start_pts = match video_stream.start_time() {
            ffi::AV_NOPTS_VALUE => None,
            pts => Some(pts),
        };

        let stream_frames = video_stream.frames().max(0) as usize;
        let duration_secs = input_ctx.duration().max(0) as f64 / ffi::AV_TIME_BASE as f64;
        let total_frames = if stream_frames == 0 {
            (duration_secs * source_fps).round() as usize
        } else {
            stream_frames
        };

        tracing::info!(
            "FfmpegReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}, estimated_total={}",
            path.display(),
            duration_secs,
            source_fps,
            stream_frames,
            total_frames
        );

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .context("Failed to create decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        tracing::info!(
            "FfmpegReader: using CPU software decoding ({}x{})",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            input_ctx,
            decoder,
            video_stream_index,
            scaler: None,
            source_fps,
            total_frames,
            frames_decoded: 0,
            time_base,
            start_pts,
            reuse_packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
        })
    }

    /// Pull the next decoded frame into `target`. Returns `false` at end of stream.
    fn decode_loop(&mut self, target: &mut ffmpeg_next::util::frame::Video) -> Result<bool> {
        loop {
            // 1. Try to receive a decoded frame
            match self.decoder.receive_frame(target) {
                Ok(()) => return Ok(true),
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) => {
                    if self.eof_sent {
                        return Ok(false);
                    }
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(false),
                Err(e) => return Err(anyhow!("Decoder error: {}", e)),
            }

            // 2. Feed packets until we find a video packet OR reach EOF
            let mut found_packet = false;
            while self.reuse_packet.read(&mut self.input_ctx).is_ok() {
                if self.reuse_packet.stream() == self.video_stream_index {
                    self.decoder
                        .send_packet(&self.reuse_packet)
                        .context("Failed to send packet to decoder")?;
                    found_packet = true;
                    break;
                }
            }

            if !found_packet {
                // Input exhausted: flush the decoder's remaining frames
                self.decoder
                    .send_eof()
                    .context("Failed to send EOF to decoder")?;
                self.eof_sent = true;
            }
        }
    }

    fn get_or_create_scaler(
        &mut self,
        src_format: ffmpeg_next::format::Pixel,
        width: u32,
        height: u32,
    ) -> Result<&mut ffmpeg_next::software::scaling::Context> {
        let scaler = match self.scaler.take() {
            Some(scaler)
                if scaler.input().format == src_format
                    && scaler.input().width == width
                    && scaler.input().height == height =>
            {
                scaler
            }
            _ => ffmpeg_next::software::scaling::Context::get(
                src_format,
                width,
                height,
                ffmpeg_next::format::Pixel::BGR24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .context("Failed to create scaler")?,
        };
        Ok(self.scaler.insert(scaler))
    }

    fn frame_timestamp_ms(&self, frame: &ffmpeg_next::util::frame::Video) -> f64 {
        pts_to_ms(
            frame.timestamp().or_else(|| frame.pts()),
            self.start_pts,
            self.time_base,
            self.frames_decoded,
            self.source_fps,
        )
    }
}

/// Presentation time in milliseconds relative to the stream start.
///
/// The time base is applied as a fraction so whole-tick timestamps land on
/// exact millisecond values (15 ticks of 1/30 s is 500.0, not 499.999...).
/// Frames without a usable PTS, or streams with a degenerate time base, are
/// placed by decode order at the nominal frame rate.
fn pts_to_ms(
    pts: Option<i64>,
    start_pts: Option<i64>,
    time_base: ffmpeg_next::Rational,
    decoded_index: usize,
    fps: f64,
) -> f64 {
    let (num, den) = (time_base.numerator(), time_base.denominator());
    match pts {
        Some(pts) if num > 0 && den > 0 => {
            let relative = pts - start_pts.unwrap_or(0);
            relative as f64 * num as f64 * 1000.0 / den as f64
        }
        _ => decoded_index as f64 * 1000.0 / fps,
    }
}

/// Convert a BGR24 ffmpeg frame to an OpenCV Mat.
/// The pixel rows are copied so the Mat owns its data once the ffmpeg frame is dropped.
fn bgr_frame_to_mat(frame: &ffmpeg_next::util::frame::Video) -> Result<core::Mat> {
    let width = frame.width() as i32;
    let height = frame.height() as i32;
    let data = frame.data(0);
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;

    let mut mat = unsafe { core::Mat::new_rows_cols(height, width, core::CV_8UC3)? };

    for y in 0..height as usize {
        let src_offset = y * stride;
        let src_row = &data[src_offset..src_offset + row_bytes];
        let dst_ptr = mat.ptr_mut(y as i32)?;
        unsafe {
            std::ptr::copy_nonoverlapping(src_row.as_ptr(), dst_ptr, row_bytes);
        }
    }

    Ok(mat)
}

impl VideoReader for FfmpegReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.source_fps)
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let mut raw_frame = ffmpeg_next::util::frame::Video::empty();
        if !self.decode_loop(&mut raw_frame)? {
            return Ok(None);
        }

        let timestamp_ms = self.frame_timestamp_ms(&raw_frame);

        let scaler =
            self.get_or_create_scaler(raw_frame.format(), raw_frame.width(), raw_frame.height())?;
        let mut bgr_frame = ffmpeg_next::util::frame::Video::empty();
        scaler
            .run(&raw_frame, &mut bgr_frame)
            .context("Scaler failed")?;

        let mat = bgr_frame_to_mat(&bgr_frame)?;
        self.frames_decoded += 1;

        Ok(Some(DecodedFrame { mat, timestamp_ms }))
    }
}

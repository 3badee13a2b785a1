//! Video compression engine.
//!
//! Policy tree, in priority order: reject clips over the absolute size
//! ceiling, pass small clips through untouched, re-encode everything else
//! through a scaled H.264 stream at a fixed bitrate, and when the re-encode
//! path fails fall back to a single-frame JPEG snapshot. The snapshot is a
//! named degraded tier, not an error: a compression-incapable environment
//! still produces a payload for any clip the decoder can open.

use ffmpeg_next as ffmpeg;
use std::{io::Write, path::Path};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    compressor::{self, Compressed},
    config::{CompressionPreset, VideoLimits},
    error::{PipelineError, Result},
    pipeline::MediaInput,
    planner,
};

/// Quality used when the snapshot tier encodes its still frame.
const SNAPSHOT_QUALITY: f32 = 0.8;

/// Compresses a video clip within the preset's dimension maxima.
///
/// Returns `SizeExceeded` for clips over the hard ceiling and `Encoding`
/// for containers that cannot even be opened; the orchestrator falls back
/// to the original bytes for the latter.
pub fn compress(
    input: &MediaInput,
    preset: &CompressionPreset,
    limits: &VideoLimits,
) -> Result<Compressed> {
    let size = input.size();
    if size > limits.max_upload_bytes {
        return Err(PipelineError::SizeExceeded {
            size,
            limit: limits.max_upload_bytes,
        });
    }
    if size < limits.skip_below_bytes {
        debug!(file = %input.file_name, size, "video below re-encode threshold");
        return Ok(Compressed::passthrough(input));
    }

    ffmpeg::init()?;
    let source = spill_to_disk(&input.bytes, input.extension())?;

    match reencode(source.path(), preset, limits) {
        Ok(bytes) if (bytes.len() as u64) < size => Ok(Compressed {
            bytes,
            mime_type: "video/mp4".to_string(),
            passthrough: false,
        }),
        Ok(bytes) => {
            debug!(
                file = %input.file_name,
                reencoded = bytes.len(),
                original = size,
                "re-encode grew the clip, keeping original bytes"
            );
            Ok(Compressed::passthrough(input))
        }
        Err(err) => {
            warn!(file = %input.file_name, %err, "re-encode failed, taking single-frame snapshot");
            let bytes = snapshot(source.path(), preset)?;
            Ok(Compressed {
                bytes,
                mime_type: "image/jpeg".to_string(),
                passthrough: false,
            })
        }
    }
}

/// Writes the payload to a scratch file so the demuxer can seek in it.
fn spill_to_disk(bytes: &[u8], extension: &str) -> Result<NamedTempFile> {
    let suffix = format!(".{}", if extension.is_empty() { "mp4" } else { extension });
    let mut file = tempfile::Builder::new().suffix(&suffix).tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Full re-encode: decode the best video stream, scale each frame to the
/// planned dimensions, and feed an H.264 encoder pinned to the target
/// bitrate. Non-video streams are remuxed as-is.
fn reencode(path: &Path, preset: &CompressionPreset, limits: &VideoLimits) -> Result<Vec<u8>> {
    let out_file = tempfile::Builder::new().suffix(".mp4").tempfile()?;

    let mut ictx = ffmpeg::format::input(path)?;
    let mut octx = ffmpeg::format::output(&out_file.path())?;
    octx.set_metadata(ictx.metadata().iter().collect());

    let best_video_stream_index = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .map(|s| s.index());

    let (stream_mapping, mut video_codec, mut scaler) =
        setup_streams(&mut ictx, &mut octx, best_video_stream_index, preset, limits)?;

    octx.write_header()?;

    for (stream, packet) in ictx.packets() {
        let istream_index = stream.index();
        let ostream_index = stream_mapping[istream_index];

        if Some(istream_index) == best_video_stream_index {
            if let (Some((ref mut enc, ref mut dec)), Some(ref mut sc)) =
                (video_codec.as_mut(), scaler.as_mut())
            {
                dec.send_packet(&packet)?;
                let time_base = dec.time_base();
                let mut decoded = ffmpeg::frame::Video::empty();
                while dec.receive_frame(&mut decoded).is_ok() {
                    let mut scaled = ffmpeg::frame::Video::empty();
                    sc.run(&decoded, &mut scaled)?;
                    scaled.set_pts(decoded.pts());
                    encode_frame(enc, &scaled, &mut octx, ostream_index, time_base)?;
                }
            }
        } else {
            let mut p = packet.clone();
            p.set_stream(ostream_index);
            p.write_interleaved(&mut octx)?;
        }
    }

    if let (Some((ref mut enc, ref mut dec)), Some(ref mut sc), Some(best_index)) = (
        video_codec.as_mut(),
        scaler.as_mut(),
        best_video_stream_index,
    ) {
        dec.send_eof()?;
        let time_base = dec.time_base();
        let mut decoded = ffmpeg::frame::Video::empty();
        while dec.receive_frame(&mut decoded).is_ok() {
            let mut scaled = ffmpeg::frame::Video::empty();
            sc.run(&decoded, &mut scaled)?;
            scaled.set_pts(decoded.pts());
            encode_frame(enc, &scaled, &mut octx, stream_mapping[best_index], time_base)?;
        }
        flush_encoder(enc, &mut octx, stream_mapping[best_index])?;
    }

    octx.write_trailer()?;

    Ok(std::fs::read(out_file.path())?)
}

/// Sends one scaled frame to the encoder and drains its packets.
fn encode_frame(
    encoder: &mut ffmpeg::encoder::video::Video,
    frame: &ffmpeg::frame::Video,
    octx: &mut ffmpeg::format::context::Output,
    ostream_index: usize,
    input_time_base: ffmpeg::Rational,
) -> Result<()> {
    encoder.send_frame(frame)?;
    let mut encoded = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(ostream_index);
        encoded.rescale_ts(input_time_base, encoder.time_base());
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

fn flush_encoder(
    encoder: &mut ffmpeg::encoder::video::Video,
    octx: &mut ffmpeg::format::context::Output,
    ostream_index: usize,
) -> Result<()> {
    encoder.send_eof()?;
    let mut encoded = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(ostream_index);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

#[allow(clippy::type_complexity)]
fn setup_streams(
    ictx: &mut ffmpeg::format::context::Input,
    octx: &mut ffmpeg::format::context::Output,
    best_video_stream_index: Option<usize>,
    preset: &CompressionPreset,
    limits: &VideoLimits,
) -> Result<(
    Vec<usize>,
    Option<(ffmpeg::encoder::Video, ffmpeg::decoder::video::Video)>,
    Option<ffmpeg::software::scaling::Context>,
)> {
    let mut stream_mapping = vec![0; ictx.nb_streams() as usize];
    let mut video_codec = None;
    let mut scaler = None;

    let format_requires_global_header = octx
        .format()
        .flags()
        .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

    for (istream_index, istream) in ictx.streams().enumerate() {
        let mut ostream = octx.add_stream(None)?;
        ostream.set_parameters(istream.parameters());

        if Some(istream_index) == best_video_stream_index {
            let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
                .ok_or_else(|| PipelineError::Encoding("H.264 encoder not found".to_string()))?;
            let dec = ffmpeg::codec::context::Context::from_parameters(istream.parameters())?
                .decoder()
                .video()?;

            let dims = planner::plan(
                dec.width(),
                dec.height(),
                preset.max_width,
                preset.max_height,
            );

            let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
                .encoder()
                .video()?;
            encoder.set_width(dims.width);
            encoder.set_height(dims.height);
            encoder.set_format(ffmpeg::format::Pixel::YUV420P);
            encoder.set_bit_rate(limits.target_bitrate);

            let mut time_base = istream.time_base();
            if time_base.1 > 65535 {
                time_base = ffmpeg::Rational::new(1, 30000);
            }
            encoder.set_time_base(time_base);
            if format_requires_global_header {
                encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
            }
            encoder.set_frame_rate(Some(ffmpeg::Rational::new(limits.frame_rate as i32, 1)));

            let mut opts = ffmpeg::Dictionary::new();
            opts.set("preset", "medium");

            let enc = encoder.open_with(opts)?;
            ostream.set_parameters(&enc);

            let sc = ffmpeg::software::scaling::Context::get(
                dec.format(),
                dec.width(),
                dec.height(),
                enc.format(),
                enc.width(),
                enc.height(),
                ffmpeg::software::scaling::flag::Flags::BILINEAR,
            )?;
            video_codec = Some((enc, dec));
            scaler = Some(sc);
        }
        stream_mapping[istream_index] = ostream.index();
    }

    Ok((stream_mapping, video_codec, scaler))
}

/// Snapshot tier: decode up to a representative timestamp and encode that
/// one frame as a JPEG still at the planned dimensions.
fn snapshot(path: &Path, preset: &CompressionPreset) -> Result<Vec<u8>> {
    let mut ictx = ffmpeg::format::input(path)?;
    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| PipelineError::Encoding("no video stream found".to_string()))?;
    let stream_index = stream.index();
    let time_base = stream.time_base();

    // A frame from ~0.5s in, never beyond the midpoint of short clips.
    let duration_secs = (stream.duration().max(0)) as f64 * f64::from(time_base);
    let target_secs = 0.5f64.min(duration_secs / 2.0).max(0.0);

    let mut decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;
    let dims = planner::plan(
        decoder.width(),
        decoder.height(),
        preset.max_width,
        preset.max_height,
    );
    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        dims.width,
        dims.height,
        ffmpeg::software::scaling::flag::Flags::LANCZOS,
    )?;

    let mut chosen: Option<ffmpeg::frame::Video> = None;
    'packets: for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        let mut decoded = ffmpeg::frame::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let secs = decoded.pts().unwrap_or(0).max(0) as f64 * f64::from(time_base);
            let mut rgb = ffmpeg::frame::Video::empty();
            scaler.run(&decoded, &mut rgb)?;
            chosen = Some(rgb);
            if secs >= target_secs {
                break 'packets;
            }
        }
    }

    if chosen.is_none() {
        decoder.send_eof()?;
        let mut decoded = ffmpeg::frame::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb = ffmpeg::frame::Video::empty();
            scaler.run(&decoded, &mut rgb)?;
            chosen = Some(rgb);
        }
    }

    let frame =
        chosen.ok_or_else(|| PipelineError::Encoding("could not decode any frame".to_string()))?;
    frame_to_jpeg(&frame)
}

/// Copies a scaled RGB24 frame row by row (the stride may exceed the row
/// width) and encodes it as a JPEG still.
fn frame_to_jpeg(frame: &ffmpeg::frame::Video) -> Result<Vec<u8>> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;

    let mut rgb = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        rgb.extend_from_slice(&data[start..start + row_bytes]);
    }

    let img = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| PipelineError::Encoding("frame buffer size mismatch".to_string()))?;
    compressor::encode_jpeg(&image::DynamicImage::ImageRgb8(img), SNAPSHOT_QUALITY)
}

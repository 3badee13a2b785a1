use ffmpeg_next as ffmpeg;
use image::{DynamicImage, ImageBuffer, Rgb};
use rand::Rng;
use std::io::Cursor;
use std::sync::{Mutex, Once};

use lumapipe::error::{PipelineError, Result};
use lumapipe::storage::{BlobStore, MediaRecord, MediaSink};

#[allow(dead_code)]
static SETUP: Once = Once::new();

#[allow(dead_code)]
pub fn setup() {
    SETUP.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "lumapipe=debug".into()),
            )
            .try_init();
    });
}

/// Random-noise JPEG: large and hard to compress, for exercising the
/// convergence loop's best-effort exit.
#[allow(dead_code)]
pub fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut rng = rand::rng();
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |_, _| {
        Rgb([rng.random(), rng.random(), rng.random()])
    });
    let mut out = Vec::new();
    img.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
        &mut out, 95,
    ))
    .unwrap();
    out
}

/// Smooth-gradient BMP: a large payload that JPEG-encodes far below any
/// target budget on the first attempt.
#[allow(dead_code)]
pub fn gradient_bmp(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Bmp)
        .unwrap();
    out.into_inner()
}

/// Synthesizes a real H.264 MP4 clip of noise frames at 30 fps. Noise
/// keeps the payload large at the given bitrate, so a re-encode at a lower
/// bitrate has room to shrink it.
#[allow(dead_code)]
pub fn synth_mp4(width: u32, height: u32, frame_count: usize, bit_rate: usize) -> Vec<u8> {
    ffmpeg::init().unwrap();
    let out = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    let mut octx = ffmpeg::format::output(&out.path()).unwrap();

    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

    let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264).unwrap();
    let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .unwrap();
    encoder.set_width(width);
    encoder.set_height(height);
    encoder.set_format(ffmpeg::format::Pixel::YUV420P);
    encoder.set_time_base(ffmpeg::Rational::new(1, 30));
    encoder.set_frame_rate(Some(ffmpeg::Rational::new(30, 1)));
    encoder.set_bit_rate(bit_rate);
    if global_header {
        encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
    }
    let mut opts = ffmpeg::Dictionary::new();
    opts.set("preset", "ultrafast");
    let mut enc = encoder.open_with(opts).unwrap();

    let mut ostream = octx.add_stream(None).unwrap();
    ostream.set_parameters(&enc);
    let ostream_index = ostream.index();

    octx.write_header().unwrap();

    let mut rng = rand::rng();
    for i in 0..frame_count {
        let mut frame = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::YUV420P, width, height);
        rng.fill(frame.data_mut(0));
        frame.data_mut(1).fill(128);
        frame.data_mut(2).fill(128);
        frame.set_pts(Some(i as i64));
        enc.send_frame(&frame).unwrap();
        drain_packets(&mut enc, &mut octx, ostream_index);
    }
    enc.send_eof().unwrap();
    drain_packets(&mut enc, &mut octx, ostream_index);
    octx.write_trailer().unwrap();

    std::fs::read(out.path()).unwrap()
}

#[allow(dead_code)]
fn drain_packets(
    enc: &mut ffmpeg::encoder::video::Video,
    octx: &mut ffmpeg::format::context::Output,
    ostream_index: usize,
) {
    let stream_time_base = octx.stream(ostream_index).unwrap().time_base();
    let mut packet = ffmpeg::Packet::empty();
    while enc.receive_packet(&mut packet).is_ok() {
        packet.set_stream(ostream_index);
        packet.rescale_ts(ffmpeg::Rational::new(1, 30), stream_time_base);
        packet.write_interleaved(&mut *octx).unwrap();
    }
}

/// In-memory blob store double recording every upload.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, usize)>>,
}

impl BlobStore for MemoryStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        self.objects
            .lock()
            .unwrap()
            .push((path.to_string(), bytes.len()));
        Ok(format!("https://blobs.example/{path}"))
    }
}

/// Blob store double that refuses every upload.
#[derive(Debug, Default)]
pub struct FailingStore;

impl BlobStore for FailingStore {
    async fn put(&self, _path: &str, _bytes: &[u8]) -> Result<String> {
        Err(PipelineError::StorageUpload("permission denied".to_string()))
    }
}

/// Persistence double collecting finished records.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Mutex<Vec<MediaRecord>>,
}

impl MediaSink for MemorySink {
    async fn persist(&self, record: &MediaRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage, RgbaImage};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ThumbnailError, WaypickError};
use crate::media::MediaFile;
use crate::Result;

/// Width of every preview; height follows the source aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 240;
/// Height of the black placeholder written when a source cannot be decoded (16:9).
pub const PLACEHOLDER_HEIGHT: u32 = 135;
/// Largest height a JPEG can hold.
pub const MAX_THUMBNAIL_HEIGHT: u32 = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub source: PathBuf,
    pub path: PathBuf,
    pub placeholder: bool,
}

/// Writes small JPEG previews named after the source's base name.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    ffmpeg: PathBuf,
}

impl ThumbnailCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn thumbnail_path(&self, source: &MediaFile) -> PathBuf {
        match source.file_name() {
            Some(name) => self.cache_dir.join(name),
            None => self.cache_dir.join(source.id().replace('/', "_")),
        }
    }

    /// Generate the preview for `source`. Never fails: a source that cannot be
    /// turned into a preview gets a black placeholder instead.
    pub fn cache(&self, source: &MediaFile) -> Thumbnail {
        let path = self.thumbnail_path(source);

        if let Err(e) = fs::create_dir_all(&self.cache_dir) {
            log::error!("Failed to create thumbnail directory {:?}: {}", self.cache_dir, e);
        }

        let placeholder = match self.render(source).and_then(|preview| write_jpeg(&preview, &path)) {
            Ok(()) => false,
            Err(e) => {
                log::warn!("Could not generate preview for {}: {}", source, e);
                if let Err(e) = write_jpeg(&placeholder_image(), &path) {
                    log::error!("Failed to write placeholder {:?}: {}", path, e);
                }
                true
            }
        };

        Thumbnail {
            source: source.path().to_path_buf(),
            path,
            placeholder,
        }
    }

    /// Generate previews for many sources at once, one blocking task per source.
    pub async fn cache_all(&self, sources: Vec<MediaFile>) -> Vec<Thumbnail> {
        let mut names = HashSet::new();
        for source in &sources {
            if let Some(name) = source.file_name() {
                if !names.insert(name.to_os_string()) {
                    log::debug!("Thumbnail name collision for {}, last writer wins", source);
                }
            }
        }

        let handles: Vec<_> = sources
            .into_iter()
            .map(|source| {
                let cache = self.clone();
                tokio::task::spawn_blocking(move || cache.cache(&source))
            })
            .collect();

        let mut thumbnails = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(thumbnail) => thumbnails.push(thumbnail),
                Err(e) => log::error!("Thumbnail task failed: {}", e),
            }
        }
        thumbnails
    }

    fn render(&self, source: &MediaFile) -> Result<RgbImage> {
        let decoded = if source.is_video() {
            self.decode_video_frame(source.path())?
        } else if source.extension() == "webp" {
            decode_webp(source.path())?
        } else {
            decode_image(source.path())?
        };

        let (width, height) = target_size(decoded.width(), decoded.height()).ok_or_else(|| {
            decode_error(
                source.path(),
                format!("cannot preview a {}x{} image", decoded.width(), decoded.height()),
            )
        })?;
        Ok(decoded.resize_exact(width, height, FilterType::Triangle).to_rgb8())
    }

    fn decode_video_frame(&self, path: &Path) -> Result<DynamicImage> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .output()
            .map_err(|e| video_error(path, e))?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(video_error(path, String::from_utf8_lossy(&output.stderr).trim()));
        }

        image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .map_err(|e| video_error(path, e))
    }
}

/// Preview size for a source of the given dimensions, or `None` for an empty image
/// or one too tall to encode.
pub fn target_size(width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let scaled = (f64::from(THUMBNAIL_WIDTH) * f64::from(height) / f64::from(width)).round();
    if scaled > f64::from(MAX_THUMBNAIL_HEIGHT) {
        return None;
    }
    Some((THUMBNAIL_WIDTH, (scaled as u32).max(1)))
}

fn placeholder_image() -> RgbImage {
    RgbImage::new(THUMBNAIL_WIDTH, PLACEHOLDER_HEIGHT)
}

// The format comes from the file contents, so a misnamed file still decodes.
fn decode_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(path, e))?
        .decode()
        .map_err(|e| decode_error(path, e))
}

// WebP goes through its own decoder and raw pixel buffer.
fn decode_webp(path: &Path) -> Result<DynamicImage> {
    let file = File::open(path).map_err(|e| decode_error(path, e))?;
    let decoder = WebPDecoder::new(BufReader::new(file)).map_err(|e| decode_error(path, e))?;
    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();
    let mut pixels = vec![0u8; decoder.total_bytes() as usize];
    decoder.read_image(&mut pixels).map_err(|e| decode_error(path, e))?;

    let image = match color {
        ColorType::Rgb8 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        ColorType::Rgba8 => RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        other => return Err(decode_error(path, format!("unexpected color type {:?}", other))),
    };
    image.ok_or_else(|| decode_error(path, "pixel buffer does not match dimensions"))
}

fn write_jpeg(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Jpeg)
        .map_err(|e| {
            WaypickError::Thumbnail(ThumbnailError::Encode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })
}

fn decode_error(path: &Path, message: impl ToString) -> WaypickError {
    WaypickError::Thumbnail(ThumbnailError::Decode {
        path: path.to_path_buf(),
        message: message.to_string(),
    })
}

fn video_error(path: &Path, message: impl ToString) -> WaypickError {
    WaypickError::Thumbnail(ThumbnailError::VideoFrame {
        path: path.to_path_buf(),
        message: message.to_string(),
    })
}

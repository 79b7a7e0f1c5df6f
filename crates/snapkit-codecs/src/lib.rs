//! # SnapKit Codecs
//!
//! Image codec layer used to turn surface pixel buffers into `data:` URLs
//! and back.
//!
//! Current support:
//! - PNG encode/decode (via `png` crate)
//! - `data:` URL encode/parse (base64 payloads)

use base64::Engine;
use thiserror::Error;

/// MIME type produced by surface snapshots.
pub const PNG_MIME: &str = "image/png";

/// Image formats recognized by magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Unknown,
}

/// Errors that can occur while encoding or decoding.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported image format: {0:?}")]
    Unsupported(ImageFormat),

    #[error("Invalid image data: {0}")]
    Invalid(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Malformed data URL: {0}")]
    DataUrl(String),
}

/// A simple RGBA8 image buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>, // RGBA8, row-major
}

impl RgbaImage {
    /// Create a fully transparent image.
    ///
    /// Fails when `width * height * 4` does not fit in `usize`.
    pub fn new(width: u32, height: u32) -> Result<Self, CodecError> {
        Ok(Self {
            width,
            height,
            data: vec![0u8; buffer_len(width, height)?],
        })
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CodecError> {
        let expected = buffer_len(width, height)?;
        if data.len() != expected {
            return Err(CodecError::Invalid(format!(
                "RGBA buffer length mismatch: got {}, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.data.chunks_exact_mut(4)
    }

    /// Read one pixel as `[r, g, b, a]`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// True when every pixel is transparent black.
    pub fn is_clear(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

fn buffer_len(width: u32, height: u32) -> Result<usize, CodecError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CodecError::Invalid(format!("{width}x{height} image is too large")))
}

/// A parsed `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Detect image format by magic bytes (best-effort).
pub fn detect_format(bytes: &[u8]) -> ImageFormat {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        ImageFormat::Png
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ImageFormat::Jpeg
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        ImageFormat::Gif
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        ImageFormat::WebP
    } else {
        ImageFormat::Unknown
    }
}

/// Encode an RGBA8 image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CodecError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CodecError::Encode("cannot encode an empty image".into()));
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        writer
            .write_image_data(image.data())
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CodecError::Encode(e.to_string()))?;
    }
    Ok(out)
}

/// Decode PNG bytes into RGBA8.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage, CodecError> {
    let format = detect_format(bytes);
    if format != ImageFormat::Png {
        return Err(CodecError::Unsupported(format));
    }

    let mut decoder = png::Decoder::new(bytes);
    // Expand palette/gray to RGB, add alpha, strip 16-bit.
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let mut reader = decoder
        .read_info()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let output = reader
        .next_frame(&mut buf)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    buf.truncate(output.buffer_size());

    let rgba = match output.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|c| [c[0], c[0], c[0], c[1]])
            .collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::Indexed => {
            return Err(CodecError::Decode(
                "Indexed PNG remained after EXPAND".to_string(),
            ))
        }
    };

    RgbaImage::from_rgba8(output.width, output.height, rgba)
}

/// Build a base64 `data:` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{payload}")
}

/// Encode an image straight to an `image/png` data URL.
pub fn png_data_url(image: &RgbaImage) -> Result<String, CodecError> {
    Ok(encode_data_url(PNG_MIME, &encode_png(image)?))
}

/// Parse a `data:[<mediatype>][;base64],<data>` URL.
pub fn parse_data_url(url: &str) -> Result<DataUrl, CodecError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| CodecError::DataUrl("missing data: scheme".into()))?;
    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| CodecError::DataUrl("missing ',' separator".into()))?;

    let (mime, is_base64) = match metadata.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (metadata, false),
    };
    let mime = if mime.is_empty() { "text/plain" } else { mime };

    let data = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| CodecError::DataUrl(e.to_string()))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(DataUrl {
        mime: mime.to_string(),
        data,
    })
}

// SPDX-License-Identifier: MIT
// CPU downscaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out. Used only to bring two captures to a common size; never upscales.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};
use image::RgbaImage;

#[derive(Debug)]
pub enum ScaleError {
    /// Target is larger than the source in at least one dimension.
    Upscale { from: (u32, u32), to: (u32, u32) },
    EmptyTarget,
    /// Pixel buffer length does not match `width * height * 4`.
    BufferSize { width: u32, height: u32, len: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::Upscale { from, to } => write!(
                f,
                "Refusing to upscale {}x{} to {}x{}",
                from.0, from.1, to.0, to.1
            ),
            ScaleError::EmptyTarget => write!(f, "Target size must be non-zero"),
            ScaleError::BufferSize { width, height, len } => write!(
                f,
                "Buffer of {} bytes does not hold a {}x{} RGBA image",
                len, width, height
            ),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Resize `src` down to `width × height`. Returns a copy when the size already matches.
pub fn downscale_rgba(
    resizer: &mut Resizer,
    src: &RgbaImage,
    width: u32,
    height: u32,
) -> Result<RgbaImage, ScaleError> {
    if width == 0 || height == 0 {
        return Err(ScaleError::EmptyTarget);
    }
    if width > src.width() || height > src.height() {
        return Err(ScaleError::Upscale {
            from: src.dimensions(),
            to: (width, height),
        });
    }
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }

    let mut out = vec![0u8; (width as usize) * (height as usize) * 4];
    {
        let src_view = TypedImageRef::<U8x4>::from_buffer(src.width(), src.height(), src.as_raw())?;
        let mut dst_image = TypedImage::<U8x4>::from_buffer(width, height, out.as_mut_slice())?;
        // Screenshots are opaque; skip alpha premultiplication.
        let opts = ResizeOptions::new().use_alpha(false);
        resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    }

    into_rgba(width, height, out)
}

fn into_rgba(width: u32, height: u32, buf: Vec<u8>) -> Result<RgbaImage, ScaleError> {
    let len = buf.len();
    RgbaImage::from_raw(width, height, buf).ok_or(ScaleError::BufferSize { width, height, len })
}

/// Bring two captures to the same size: `(min width, min height)` for both.
///
/// Pairs that already match are returned unchanged.
pub fn downscale_to_common(
    a: RgbaImage,
    b: RgbaImage,
) -> Result<(RgbaImage, RgbaImage), ScaleError> {
    if a.dimensions() == b.dimensions() {
        return Ok((a, b));
    }
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    log::debug!(
        "downscaling capture pair {}x{} / {}x{} to {}x{}",
        a.width(),
        a.height(),
        b.width(),
        b.height(),
        width,
        height
    );

    let mut resizer = Resizer::new();
    let a = downscale_rgba(&mut resizer, &a, width, height)?;
    let b = downscale_rgba(&mut resizer, &b, width, height)?;
    Ok((a, b))
}

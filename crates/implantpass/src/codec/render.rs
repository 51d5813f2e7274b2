//! QR rasterization.
//!
//! The symbol is built by `qrcode`, then sampled onto a square canvas of the
//! configured width with `image`. Each output pixel maps back to the module
//! under it, so modules may span a fractional number of pixels and the image
//! keeps its size whatever the symbol version. The configured margin replaces
//! `qrcode`'s built-in four-module quiet zone.

use std::io::Cursor;
use std::sync::LazyLock;

use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use qrcode::{Color, EcLevel, QrCode};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([0-9a-fA-F]{6})$").expect("valid color regex"));

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Largest accepted image side, in pixels.
pub const MAX_IMAGE_SIDE: u32 = 4096;

/// Largest accepted `scale`.
pub const MAX_SCALE: u32 = 16;

/// Largest accepted `margin`, in modules.
pub const MAX_MARGIN: u32 = 16;

/// QR error-correction strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// Recovers about 7% of damaged codewords.
    L,
    /// Recovers about 15%.
    M,
    /// Recovers about 25%.
    Q,
    /// Recovers about 30%.
    #[default]
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

impl std::fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L => write!(f, "L"),
            Self::M => write!(f, "M"),
            Self::Q => write!(f, "Q"),
            Self::H => write!(f, "H"),
        }
    }
}

/// How a payload is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Error-correction strength.
    pub ec_level: ErrorCorrection,
    /// Image width in pixels, margin included.
    pub width: u32,
    /// Pixels per module when `width` has fewer pixels than the symbol has
    /// modules.
    pub scale: u32,
    /// Quiet zone around the symbol, in modules.
    pub margin: u32,
    /// Module color as `#rrggbb`.
    pub dark: String,
    /// Background color as `#rrggbb`.
    pub light: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::single()
    }
}

impl RenderOptions {
    /// Options for a single-procedure code.
    #[must_use]
    pub fn single() -> Self {
        Self {
            ec_level: ErrorCorrection::H,
            width: 300,
            scale: 2,
            margin: 1,
            dark: "#000000".to_string(),
            light: "#ffffff".to_string(),
        }
    }

    /// Options for a collection code: larger and at a higher scale, since the
    /// payload is larger.
    #[must_use]
    pub fn collection() -> Self {
        Self {
            width: 400,
            scale: 4,
            ..Self::single()
        }
    }

    /// Options for the fallback error code.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            ec_level: ErrorCorrection::L,
            ..Self::single()
        }
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the width, scale or margin is out of range or a
    /// color is not `#rrggbb`.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.width > MAX_IMAGE_SIDE {
            return Err(Error::config_validation(format!(
                "width ({}) must be between 1 and {MAX_IMAGE_SIDE}",
                self.width
            )));
        }
        if self.scale == 0 || self.scale > MAX_SCALE {
            return Err(Error::config_validation(format!(
                "scale ({}) must be between 1 and {MAX_SCALE}",
                self.scale
            )));
        }
        if self.margin > MAX_MARGIN {
            return Err(Error::config_validation(format!(
                "margin ({}) must be at most {MAX_MARGIN}",
                self.margin
            )));
        }
        parse_color(&self.dark)?;
        parse_color(&self.light)?;
        Ok(())
    }

    /// Image side for a symbol spanning `total_modules`, margin included.
    ///
    /// `width` when it has at least one pixel per module, else
    /// `total_modules * scale`.
    fn image_side(&self, total_modules: u32) -> Result<u32> {
        let side = if self.width >= total_modules {
            self.width
        } else {
            total_modules
                .checked_mul(self.scale.max(1))
                .ok_or_else(|| Error::rendering("image size out of range"))?
        };
        if side > MAX_IMAGE_SIDE {
            return Err(Error::rendering(format!(
                "image side of {side} px exceeds {MAX_IMAGE_SIDE} px"
            )));
        }
        Ok(side)
    }
}

/// For each pixel along one axis, the symbol module under it, or `None` in
/// the margin.
fn module_lookup(side: u32, total: u32, margin: u32, modules: u32) -> Vec<Option<usize>> {
    (0..side)
        .map(|px| {
            let cell = u64::from(px) * u64::from(total) / u64::from(side);
            cell.checked_sub(u64::from(margin))
                .filter(|&module| module < u64::from(modules))
                .and_then(|module| usize::try_from(module).ok())
        })
        .collect()
}

/// Parse a `#rrggbb` color.
fn parse_color(value: &str) -> Result<Rgb<u8>> {
    let hex = HEX_COLOR
        .captures(value)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| Error::config_validation(format!("invalid color: {value}")))?
        .as_str();

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|e| Error::config_validation(format!("invalid color {value}: {e}")))
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

/// A rendered QR code together with the text it carries.
#[derive(Debug, Clone)]
pub struct BarcodeImage {
    image: RgbImage,
    payload: String,
    ec_level: ErrorCorrection,
    fallback: bool,
}

impl BarcodeImage {
    /// A light square carrying no symbol. Last resort when even the fallback
    /// message cannot be encoded.
    pub(crate) fn blank(width: u32, payload: impl Into<String>) -> Self {
        let side = width.max(1);
        Self {
            image: RgbImage::from_pixel(side, side, WHITE),
            payload: payload.into(),
            ec_level: ErrorCorrection::L,
            fallback: true,
        }
    }

    pub(crate) fn into_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// The text encoded in the symbol.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether this image carries the error message instead of the data.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Error-correction level used.
    #[must_use]
    pub fn ec_level(&self) -> ErrorCorrection {
        self.ec_level
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The raw raster.
    #[must_use]
    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Encode as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rendering`] if PNG encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Encode as a `data:image/png;base64,...` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rendering`] if PNG encoding fails.
    pub fn to_data_url(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

/// Render `payload` as a QR code.
///
/// # Errors
///
/// Returns [`Error::Rendering`] if the payload does not fit in a QR symbol at
/// the requested error-correction level, and a validation error if a color is
/// malformed.
pub fn render(payload: &str, options: &RenderOptions) -> Result<BarcodeImage> {
    let dark = parse_color(&options.dark)?;
    let light = parse_color(&options.light)?;
    let code = QrCode::with_error_correction_level(payload.as_bytes(), options.ec_level.into())?;

    let width = code.width();
    let modules =
        u32::try_from(width).map_err(|_| Error::rendering("symbol width out of range"))?;
    let total = options
        .margin
        .checked_mul(2)
        .and_then(|margin| margin.checked_add(modules))
        .ok_or_else(|| Error::rendering("margin out of range"))?;
    let side = options.image_side(total)?;

    let colors = code.to_colors();
    let lookup = module_lookup(side, total, options.margin, modules);
    let mut pixels = Vec::with_capacity(lookup.len() * lookup.len() * 3);
    for row in &lookup {
        for col in &lookup {
            let color = match row.zip(*col).map(|(r, c)| colors[r * width + c]) {
                Some(Color::Dark) => dark,
                _ => light,
            };
            pixels.extend_from_slice(&color.0);
        }
    }
    let canvas = RgbImage::from_raw(side, side, pixels)
        .ok_or_else(|| Error::rendering("raster size mismatch"))?;

    Ok(BarcodeImage {
        image: canvas,
        payload: payload.to_string(),
        ec_level: options.ec_level,
        fallback: false,
    })
}

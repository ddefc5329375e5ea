//! Request and response bodies of the remote try-on API.

use std::fmt;
use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use wardrobe_common::GarmentCategory;

use crate::error::Result;

/// Lossy quality used for request payloads
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// `POST /run` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub model_image: String,
    pub garment_image: String,
    pub category: &'static str,
    pub mode: &'static str,
    pub restore_clothes: bool,
    pub cover_feet: bool,
}

impl RunRequest {
    pub fn new(model_image: String, garment_image: String, category: GarmentCategory) -> Self {
        Self {
            model_image,
            garment_image,
            category: category.api_name(),
            mode: "quality",
            restore_clothes: true,
            cover_feet: true,
        }
    }

    /// Encode both images as JPEG data URIs
    pub fn from_images(
        model: &DynamicImage,
        garment: &DynamicImage,
        category: GarmentCategory,
        quality: u8,
    ) -> Result<Self> {
        Ok(Self::new(
            jpeg_data_uri(model, quality)?,
            jpeg_data_uri(garment, quality)?,
            category,
        ))
    }
}

/// Error payload; the service sends either a bare string or an object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RemoteError {
    Message(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        message: String,
    },
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Detailed { name: Some(name), message } => write!(f, "{name}: {message}"),
            Self::Detailed { name: None, message } => f.write_str(message),
        }
    }
}

/// `POST /run` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

/// Job status reported by `GET /status/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RemoteStatus {
    Starting,
    InQueue,
    Processing,
    Completed,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// `GET /status/{id}` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

impl StatusResponse {
    pub(crate) fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map_or_else(|| "no reason given".to_string(), ToString::to_string)
    }
}

/// JPEG-encode `image` (transparency flattened onto white) as a data URI
pub fn jpeg_data_uri(image: &DynamicImage, quality: u8) -> Result<String> {
    let rgb = flatten_onto_white(image);
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        encoder.encode_image(&rgb)?;
    }
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes.into_inner())))
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

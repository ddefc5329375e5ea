use std::fs;
use std::path::Path;

use cutout::{MaskingSession, OverlayRenderer};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wardrobe_common::{GarmentCategory, Point2D, Rectangle, Size};

#[derive(Error, Debug)]
pub enum ClosetError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("API key not provided. Use --api-key or set {0}")]
    MissingApiKey(String),
    #[error("Stroke file has no points")]
    EmptyStroke,
    #[error("Invalid viewport '{0}', expected WIDTHxHEIGHT")]
    InvalidViewport(String),
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),
}

/// A freehand lasso recorded in view coordinates.
///
/// Accepts either `{"points": [[x, y], ...]}` or a bare `[[x, y], ...]`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum StrokeInput {
    Points(Vec<[f64; 2]>),
    Object { points: Vec<[f64; 2]> },
}

impl StrokeInput {
    pub fn from_json(content: &str) -> Result<Self, ClosetError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ClosetError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn points(&self) -> impl Iterator<Item = Point2D> + '_ {
        let points = match self {
            Self::Points(points) | Self::Object { points } => points,
        };
        points.iter().map(|&p| Point2D::from(p))
    }

    /// Draw this stroke into `session` and close it
    pub fn replay<R: OverlayRenderer>(&self, session: &mut MaskingSession<R>) -> Result<(), ClosetError> {
        let mut points = self.points();
        let first = points.next().ok_or(ClosetError::EmptyStroke)?;
        session.begin(first);
        for point in points {
            session.extend(point);
        }
        session.close();
        Ok(())
    }
}

/// Parse `390x844` into a viewport size
pub fn parse_viewport(value: &str) -> Result<Size, ClosetError> {
    Size::parse(value)
        .filter(|size| !size.is_empty())
        .ok_or_else(|| ClosetError::InvalidViewport(value.to_string()))
}

pub fn parse_category(value: &str) -> Result<GarmentCategory, ClosetError> {
    GarmentCategory::parse(value).map_err(|_| ClosetError::UnknownCategory(value.to_string()))
}

/// One-line description of where a `width x height` photo sits in the viewport
pub fn display_summary(width: u32, height: u32, rect: &Rectangle) -> String {
    format!(
        "Photo {width}x{height} shown at ({:.1}, {:.1}) size {:.1}x{:.1}",
        rect.position.x, rect.position.y, rect.size.width, rect.size.height
    )
}

/// Prefer the explicit flag, then the environment variable `env_var`
pub fn resolve_api_key(flag: Option<&str>, env_var: &str) -> Result<String, ClosetError> {
    flag.map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ClosetError::MissingApiKey(env_var.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn test_stroke_input_forms() {
        let object = StrokeInput::from_json(r#"{"points":[[1,2],[3,4]]}"#).unwrap();
        let bare = StrokeInput::from_json("[[1,2],[3,4]]").unwrap();
        assert_eq!(object.points().collect::<Vec<_>>(), bare.points().collect::<Vec<_>>());
        assert_eq!(bare.points().nth(1), Some(Point2D::new(3.0, 4.0)));
    }

    #[test]
    fn test_replay_closes_stroke() {
        let photo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([9, 9, 9, 255])));
        let mut session = MaskingSession::new(&photo, Size::new(200.0, 320.0)).unwrap();
        let stroke = StrokeInput::from_json("[[20,20],[180,20],[180,180],[20,180]]").unwrap();

        stroke.replay(&mut session).unwrap();
        assert_eq!(session.tracker().history().len(), 1);
        assert!(session.extract().is_ok());
    }

    #[test]
    fn test_stroke_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"points":[[0.5,1.5],[10,1.5],[10,12]]}"#).unwrap();

        let stroke = StrokeInput::from_json_file(file.path()).unwrap();
        assert_eq!(stroke.points().count(), 3);
        assert_eq!(stroke.points().next(), Some(Point2D::new(0.5, 1.5)));
        assert!(StrokeInput::from_json_file(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn test_display_summary() {
        let photo = DynamicImage::ImageRgba8(RgbaImage::new(300, 600));
        let session = MaskingSession::new(&photo, Size::new(390.0, 844.0)).unwrap();
        let summary = display_summary(photo.width(), photo.height(), &session.display_rect());
        assert!(summary.starts_with("Photo 300x600 shown at ("), "{summary}");
        assert!(summary.contains("size 362.0x724.0"), "{summary}");
    }

    #[test]
    fn test_empty_stroke() {
        let photo = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));
        let mut session = MaskingSession::new(&photo, Size::new(200.0, 320.0)).unwrap();
        let stroke = StrokeInput::from_json("[]").unwrap();
        assert!(matches!(stroke.replay(&mut session), Err(ClosetError::EmptyStroke)));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_viewport("390x844").unwrap(), Size::new(390.0, 844.0));
        assert!(matches!(parse_viewport("0x844"), Err(ClosetError::InvalidViewport(_))));
        assert!(matches!(parse_viewport("wide"), Err(ClosetError::InvalidViewport(_))));
        assert_eq!(parse_category("Bottom").unwrap(), GarmentCategory::Bottom);
        assert!(parse_category("hat").is_err());
    }

    #[test]
    fn test_api_key_flag_wins() {
        let key = resolve_api_key(Some("from-flag"), "CLOSET_TEST_UNSET_KEY").unwrap();
        assert_eq!(key, "from-flag");
        assert!(matches!(
            resolve_api_key(None, "CLOSET_TEST_UNSET_KEY"),
            Err(ClosetError::MissingApiKey(_))
        ));
    }
}

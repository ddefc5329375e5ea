use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("No closed stroke to extract; draw around the garment first")]
    EmptyMask,

    #[error("Mask has no area ({width} x {height} px bounding box)")]
    DegenerateMask { width: f64, height: f64 },

    #[error("Mask bounding box {width} x {height} px reaches far outside the image")]
    MaskTooLarge { width: f64, height: f64 },

    #[error("Viewport {width} x {height} leaves no room to display the image")]
    InvalidViewport { width: f64, height: f64 },

    #[error("Source image has no pixels")]
    EmptyImage,

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
}

impl MaskError {
    /// True for conditions the user fixes by drawing again
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::EmptyMask | Self::DegenerateMask { .. } | Self::MaskTooLarge { .. })
    }
}

pub type Result<T> = std::result::Result<T, MaskError>;

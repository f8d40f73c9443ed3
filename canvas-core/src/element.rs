//! Canvas elements - the base image and the overlays placed on it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CanvasError, CanvasResult, SizingPolicy};

/// Fraction of the base image width an overlay occupies at `scale == 1.0`.
pub const DEFAULT_TARGET_WIDTH_FRACTION: f64 = 0.2;

/// Unique identifier for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Create a new unique element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ElementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The type of content an element contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ElementKind {
    /// The photo overlays are composited onto.
    BaseImage {
        /// Image source URL or data URI.
        src: String,
        /// Native width in pixels.
        natural_width: u32,
        /// Native height in pixels.
        natural_height: u32,
    },

    /// A logo or secondary photo placed on the base image.
    LogoOverlay {
        /// Image source URL or data URI.
        src: String,
        /// Native width in pixels.
        natural_width: u32,
        /// Native height in pixels.
        natural_height: u32,
    },

    /// A text label placed on the base image.
    TextOverlay {
        /// Text content.
        content: String,
        /// Font size in base-image pixels.
        font_size: f64,
        /// Text color as hex.
        color: String,
        /// Pre-rendered raster of the text (URL or data URI), supplied by the
        /// client since glyph shaping happens there.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rendered: Option<String>,
    },
}

impl ElementKind {
    /// Native pixel size, if the element is backed by a raster.
    #[must_use]
    pub fn natural_size(&self) -> Option<(u32, u32)> {
        match self {
            Self::BaseImage {
                natural_width,
                natural_height,
                ..
            }
            | Self::LogoOverlay {
                natural_width,
                natural_height,
                ..
            } => Some((*natural_width, *natural_height)),
            Self::TextOverlay { .. } => None,
        }
    }

    /// Whether resizing must preserve the natural aspect ratio.
    ///
    /// Images and logos are aspect-locked; text may change width on its own.
    #[must_use]
    pub fn is_aspect_locked(&self) -> bool {
        !matches!(self, Self::TextOverlay { .. })
    }

    /// Whether this is the base image.
    #[must_use]
    pub fn is_base(&self) -> bool {
        matches!(self, Self::BaseImage { .. })
    }

    /// Whether this is a text overlay.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::TextOverlay { .. })
    }

    /// The fetchable source backing this element, if any.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::BaseImage { src, .. } | Self::LogoOverlay { src, .. } => Some(src),
            Self::TextOverlay { rendered, .. } => rendered.as_deref(),
        }
    }
}

/// Which corner of an element's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    /// Top-left.
    #[serde(rename = "tl")]
    TopLeft,
    /// Top-right.
    #[serde(rename = "tr")]
    TopRight,
    /// Bottom-left.
    #[serde(rename = "bl")]
    BottomLeft,
    /// Bottom-right.
    #[serde(rename = "br")]
    BottomRight,
}

impl Corner {
    /// All four corners, in hit-test order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// The diagonally opposite corner.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::TopRight => Self::BottomLeft,
            Self::BottomLeft => Self::TopRight,
            Self::BottomRight => Self::TopLeft,
        }
    }

    /// Whether the corner lies on the right edge.
    #[must_use]
    pub fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }

    /// Whether the corner lies on the bottom edge.
    #[must_use]
    pub fn is_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomRight)
    }
}

/// Position, size and scale of an element in base-image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// X position of the top-left corner.
    pub x: f64,
    /// Y position of the top-left corner.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    /// Multiplier on the element's natural size.
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Create a transform at `(x, y)` with the given extent and scale 1.
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale: 1.0,
        }
    }

    /// The transform the compositor renders for an overlay of the given
    /// natural size inside an output frame of `frame` pixels. Position is
    /// the origin.
    #[must_use]
    pub fn fitted(
        frame: (f64, f64),
        natural: (u32, u32),
        scale: f64,
        sizing: &SizingPolicy,
    ) -> Self {
        let (width, height) = sizing.overlay_extent(frame, natural, scale);
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            scale,
        }
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Check the positive-extent invariant.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidTransform`] if any component is not
    /// finite, or width, height or scale is not strictly positive.
    pub fn validate(&self) -> CanvasResult<()> {
        let all_finite = [self.x, self.y, self.width, self.height, self.scale]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(CanvasError::InvalidTransform(
                "components must be finite".to_string(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(CanvasError::InvalidTransform(format!(
                "extent must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.scale <= 0.0 {
            return Err(CanvasError::InvalidTransform(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Position of the given corner.
    #[must_use]
    pub fn corner(&self, corner: Corner) -> (f64, f64) {
        let x = if corner.is_right() {
            self.x + self.width
        } else {
            self.x
        };
        let y = if corner.is_bottom() {
            self.y + self.height
        } else {
            self.y
        };
        (x, y)
    }

    /// Check if a point (in image coordinates) is within the bounds.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// A canvas element with content and transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique identifier, stable for the session.
    pub id: ElementId,
    /// Element content type.
    pub kind: ElementKind,
    /// Position and size.
    pub transform: Transform,
    /// Insertion order; also the paint order.
    pub z_order: u64,
    /// Hidden elements are neither hit-tested nor composited.
    pub visible: bool,
}

impl Element {
    /// Create a new visible element with the given kind.
    #[must_use]
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            kind,
            transform: Transform::default(),
            z_order: 0,
            visible: true,
        }
    }

    /// Set the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Check if a point (in image coordinates) is within this element.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.transform.contains_point(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitted_transform_matches_compositor_sizing() {
        let t = Transform::fitted((1000.0, 800.0), (500, 300), 1.0, &SizingPolicy::default());
        assert!((t.width - 200.0).abs() < 1e-9);
        assert!((t.height - 120.0).abs() < 1e-9);
        assert!((t.scale - 1.0).abs() < f64::EPSILON);

        // Scale is kept even when the rendered size is capped.
        let capped = Transform::fitted((1000.0, 800.0), (50, 30), 3.0, &SizingPolicy::default());
        assert!((capped.width - 50.0).abs() < 1e-9);
        assert!((capped.scale - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_degenerate_extents() {
        assert!(Transform::new(0.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(Transform::new(0.0, 0.0, 10.0, -1.0).validate().is_err());
        assert!(Transform::default().with_scale(0.0).validate().is_err());
        assert!(Transform::new(f64::NAN, 0.0, 10.0, 10.0).validate().is_err());
        assert!(Transform::default().validate().is_ok());
    }

    #[test]
    fn corners_and_opposites() {
        let t = Transform::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(t.corner(Corner::TopLeft), (10.0, 20.0));
        assert_eq!(t.corner(Corner::BottomRight), (110.0, 70.0));
        assert_eq!(t.corner(Corner::TopRight), (110.0, 20.0));
        for corner in Corner::ALL {
            assert_eq!(corner.opposite().opposite(), corner);
        }
    }

    #[test]
    fn text_is_not_aspect_locked() {
        let text = ElementKind::TextOverlay {
            content: "Sale".to_string(),
            font_size: 32.0,
            color: "#ffffff".to_string(),
            rendered: None,
        };
        assert!(!text.is_aspect_locked());
        assert!(text.natural_size().is_none());

        let logo = ElementKind::LogoOverlay {
            src: "https://cdn.example.com/logo.png".to_string(),
            natural_width: 500,
            natural_height: 300,
        };
        assert!(logo.is_aspect_locked());
        assert_eq!(logo.natural_size(), Some((500, 300)));
    }

    #[test]
    fn element_id_parses_from_display() {
        let id = ElementId::new();
        let parsed: ElementId = id.to_string().parse().expect("should parse");
        assert_eq!(parsed, id);
    }
}

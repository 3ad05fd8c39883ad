//! Highlight types
//!
//! A highlight is a rectangle on one page of one file, produced by a user
//! drawing it (manual), by a text search match, or by entity detection.
//! Geometry is stored raw; the padded box used for rendering and hit-testing
//! is derived on read by [`corrected_bounding_box`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Padding added to the left and top edges of typed highlights
const EDGE_PADDING: f64 = 5.0;
/// Padding added to the right edge of typed highlights
const RIGHT_PADDING: f64 = 2.0;

/// A highlight anchored to a page of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    /// Unique identifier. Empty until the store assigns one.
    #[serde(default)]
    pub id: String,
    /// The document this highlight belongs to
    #[serde(default)]
    pub file_key: String,
    /// 1-based page number. Zero until placed on a page.
    #[serde(default)]
    pub page: u32,
    /// Left edge in page space
    pub x: f64,
    /// Top edge in page space
    pub y: f64,
    /// Width (may be zero)
    pub w: f64,
    /// Height (may be zero)
    pub h: f64,
    /// Where the highlight came from
    #[serde(rename = "type", default)]
    pub highlight_type: HighlightType,
    /// Source text covered by the highlight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Entity label for detected entities (e.g. `EMAIL`, `PERSON`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Rendering color hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Rendering opacity hint (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Origin of a highlight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HighlightType {
    /// Drawn by the user
    #[default]
    Manual,
    /// Produced by a text search match
    Search,
    /// Produced by automated entity detection
    Entity,
}

impl HighlightType {
    /// Stable lowercase name, used for id prefixes and persisted rows
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightType::Manual => "manual",
            HighlightType::Search => "search",
            HighlightType::Entity => "entity",
        }
    }

    /// Parse a persisted or user-supplied type name (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "manual" => Some(HighlightType::Manual),
            "search" => Some(HighlightType::Search),
            "entity" => Some(HighlightType::Entity),
            _ => None,
        }
    }
}

impl std::fmt::Display for HighlightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box in page space, as corner coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    /// Unpadded box for an origin and size
    pub fn raw(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + w,
            y1: y + h,
        }
    }

    /// Whether the point lies inside the box (edges inclusive)
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Whether two boxes overlap (touching edges count)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }
}

/// Padded box for a highlight of the given type.
///
/// Typed highlights are shifted by 5 on the left and top while the right edge
/// only grows by 2, so `x1` can end up left of `x0 + w`. Renderers depend on
/// this exact geometry. Without a type the raw box is returned.
pub fn corrected_bounding_box_for(
    highlight_type: Option<HighlightType>,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
) -> BoundingBox {
    match highlight_type {
        Some(HighlightType::Manual | HighlightType::Search | HighlightType::Entity) => BoundingBox {
            x0: x + EDGE_PADDING,
            y0: y + EDGE_PADDING,
            x1: x + w + RIGHT_PADDING,
            y1: y + h,
        },
        None => BoundingBox::raw(x, y, w, h),
    }
}

/// Padded box for a stored highlight
pub fn corrected_bounding_box(highlight: &Highlight) -> BoundingBox {
    corrected_bounding_box_for(
        Some(highlight.highlight_type),
        highlight.x,
        highlight.y,
        highlight.w,
        highlight.h,
    )
}

/// Spatial criterion for position-based removal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// Highlights whose corrected box contains the point
    Point { x: f64, y: f64 },
    /// Highlights whose corrected box overlaps the rectangle
    Rect(BoundingBox),
}

impl Region {
    pub fn matches(&self, highlight: &Highlight) -> bool {
        let bbox = corrected_bounding_box(highlight);
        match self {
            Region::Point { x, y } => bbox.contains_point(*x, *y),
            Region::Rect(rect) => bbox.intersects(rect),
        }
    }
}

/// Typed selector over a highlight's optional fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "camelCase")]
pub enum HighlightProperty {
    Text(String),
    Entity(String),
    Color(String),
    Type(HighlightType),
}

impl HighlightProperty {
    /// Exact-match test against the highlight's field
    pub fn matches(&self, highlight: &Highlight) -> bool {
        match self {
            HighlightProperty::Text(text) => highlight.text.as_deref() == Some(text.as_str()),
            HighlightProperty::Entity(entity) => {
                highlight.entity.as_deref() == Some(entity.as_str())
            }
            HighlightProperty::Color(color) => highlight.color.as_deref() == Some(color.as_str()),
            HighlightProperty::Type(t) => highlight.highlight_type == *t,
        }
    }
}

impl Highlight {
    /// Create an unassigned highlight of the given type
    pub fn new(
        file_key: &str,
        page: u32,
        highlight_type: HighlightType,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    ) -> Self {
        Self {
            id: String::new(),
            file_key: file_key.to_string(),
            page,
            x,
            y,
            w,
            h,
            highlight_type,
            text: None,
            entity: None,
            color: None,
            opacity: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a user-drawn highlight
    pub fn manual(file_key: &str, page: u32, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(file_key, page, HighlightType::Manual, x, y, w, h)
    }

    /// Create a highlight for a text search match
    pub fn search_match(file_key: &str, page: u32, text: &str, bbox: BoundingBox) -> Self {
        Self::new(
            file_key,
            page,
            HighlightType::Search,
            bbox.x0,
            bbox.y0,
            bbox.x1 - bbox.x0,
            bbox.y1 - bbox.y0,
        )
        .with_text(text)
    }

    /// Create a highlight for a detected entity
    pub fn detected_entity(
        file_key: &str,
        page: u32,
        entity: &str,
        text: &str,
        bbox: BoundingBox,
    ) -> Self {
        let mut highlight = Self::new(
            file_key,
            page,
            HighlightType::Entity,
            bbox.x0,
            bbox.y0,
            bbox.x1 - bbox.x0,
            bbox.y1 - bbox.y0,
        )
        .with_text(text);
        highlight.entity = Some(entity.to_string());
        highlight
    }

    /// Set an explicit id
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Set the covered text
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Set the color
    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Whether the store still has to assign an id
    pub fn is_unassigned(&self) -> bool {
        self.id.is_empty()
    }

    /// Padded box used by renderers and hit-testing
    pub fn corrected_bounding_box(&self) -> BoundingBox {
        corrected_bounding_box(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(highlight_type: HighlightType) -> Highlight {
        Highlight::new("doc.pdf", 1, highlight_type, 100.0, 200.0, 50.0, 25.0)
    }

    #[test]
    fn test_corrected_box_for_typed_highlights() {
        for t in [HighlightType::Manual, HighlightType::Search, HighlightType::Entity] {
            let bbox = corrected_bounding_box(&sample(t));
            assert_eq!(
                bbox,
                BoundingBox {
                    x0: 105.0,
                    y0: 205.0,
                    x1: 152.0,
                    y1: 225.0
                }
            );
        }
    }

    #[test]
    fn test_corrected_box_without_type_is_raw() {
        let bbox = corrected_bounding_box_for(None, 100.0, 200.0, 50.0, 25.0);
        assert_eq!(
            bbox,
            BoundingBox {
                x0: 100.0,
                y0: 200.0,
                x1: 150.0,
                y1: 225.0
            }
        );
    }

    #[test]
    fn test_zero_size_box() {
        let highlight = Highlight::manual("doc.pdf", 1, 10.0, 10.0, 0.0, 0.0);
        let bbox = highlight.corrected_bounding_box();
        assert_eq!(bbox.x0, 15.0);
        assert_eq!(bbox.x1, 12.0);
        assert_eq!(bbox.y0, 15.0);
        assert_eq!(bbox.y1, 10.0);
    }

    #[test]
    fn test_region_matching_uses_corrected_box() {
        let highlight = sample(HighlightType::Manual);

        assert!(Region::Point { x: 110.0, y: 210.0 }.matches(&highlight));
        // Inside the raw box but left of the padded edge
        assert!(!Region::Point { x: 101.0, y: 210.0 }.matches(&highlight));

        let rect = BoundingBox::raw(150.0, 220.0, 10.0, 10.0);
        assert!(Region::Rect(rect).matches(&highlight));
        let far = BoundingBox::raw(500.0, 500.0, 10.0, 10.0);
        assert!(!Region::Rect(far).matches(&highlight));
    }

    #[test]
    fn test_property_matching() {
        let highlight = Highlight::detected_entity(
            "doc.pdf",
            2,
            "EMAIL",
            "a@b.c",
            BoundingBox::raw(0.0, 0.0, 10.0, 10.0),
        );

        assert!(HighlightProperty::Entity("EMAIL".into()).matches(&highlight));
        assert!(HighlightProperty::Text("a@b.c".into()).matches(&highlight));
        assert!(HighlightProperty::Type(HighlightType::Entity).matches(&highlight));
        assert!(!HighlightProperty::Color("red".into()).matches(&highlight));
    }

    #[test]
    fn test_serialization() {
        let highlight = sample(HighlightType::Search).with_id("h1").with_text("secret");

        let json = serde_json::to_string(&highlight).unwrap();
        assert!(json.contains("\"type\":\"SEARCH\""));
        assert!(json.contains("\"fileKey\":\"doc.pdf\""));
        assert!(!json.contains("entity"));

        let parsed: Highlight = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, highlight);
    }

    #[test]
    fn test_missing_id_deserializes_unassigned() {
        let parsed: Highlight =
            serde_json::from_str(r#"{"x":1,"y":2,"w":3,"h":4,"type":"ENTITY"}"#).unwrap();
        assert!(parsed.is_unassigned());
        assert_eq!(parsed.page, 0);
        assert_eq!(parsed.highlight_type, HighlightType::Entity);
    }

    #[test]
    fn test_type_parse() {
        assert_eq!(HighlightType::parse("SEARCH"), Some(HighlightType::Search));
        assert_eq!(HighlightType::parse("entity"), Some(HighlightType::Entity));
        assert_eq!(HighlightType::parse("underline"), None);
    }
}

//! Data model types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Video time of a frame, the primary key into all per-frame data
pub type Timestamp = f64;

/// Identifier of one contiguous timestamp segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub i64);

impl SegmentId {
    /// The first segment of a file; it is created with the file and never merged away.
    pub const PRIMARY: SegmentId = SegmentId(0);

    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable channel identifier, never reissued after deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Event,
    Pos,
    Zone,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Event => "event",
            ChannelKind::Pos => "pos",
            ChannelKind::Zone => "zone",
        }
    }

    /// Event and position channels hold one value per timestamp
    pub fn is_temporal(&self) -> bool {
        !matches!(self, ChannelKind::Zone)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(ChannelKind::Event),
            "pos" => Ok(ChannelKind::Pos),
            "zone" => Ok(ChannelKind::Zone),
            other => Err(StoreError::InvalidData(format!(
                "unknown channel kind {:?}",
                other
            ))),
        }
    }
}

/// An (x, y) sample of a position channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Marks a frame where the position was not coded
    pub const NOT_CODED: Position = Position { x: -1.0, y: -1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_coded(&self) -> bool {
        *self != Self::NOT_CODED
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A single temporal channel value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Event(bool),
    Pos(Position),
}

impl Value {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Value::Event(_) => ChannelKind::Event,
            Value::Pos(_) => ChannelKind::Pos,
        }
    }

    /// Whether the value differs from the channel's unset sentinel
    pub fn is_set(&self) -> bool {
        match self {
            Value::Event(v) => *v,
            Value::Pos(p) => p.is_coded(),
        }
    }

    pub fn as_event(&self) -> Option<bool> {
        match self {
            Value::Event(v) => Some(*v),
            Value::Pos(_) => None,
        }
    }

    pub fn as_pos(&self) -> Option<Position> {
        match self {
            Value::Pos(p) => Some(*p),
            Value::Event(_) => None,
        }
    }
}

/// Static zone geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Polygon {
        points: Vec<[f64; 2]>,
    },
    Circle {
        center: [f64; 2],
        radius: f64,
    },
    Ellipse {
        center: [f64; 2],
        radius_x: f64,
        radius_y: f64,
        /// Rotation in degrees, counter-clockwise
        #[serde(default)]
        angle: f64,
    },
}

impl Shape {
    pub fn area(&self) -> f64 {
        match self {
            Shape::Polygon { points } => signed_polygon_area(points).abs(),
            Shape::Circle { radius, .. } => std::f64::consts::PI * radius * radius,
            Shape::Ellipse {
                radius_x, radius_y, ..
            } => std::f64::consts::PI * radius_x * radius_y,
        }
    }

    pub fn centroid(&self) -> Position {
        match self {
            Shape::Polygon { points } => polygon_centroid(points),
            Shape::Circle { center, .. } | Shape::Ellipse { center, .. } => {
                Position::new(center[0], center[1])
            }
        }
    }

    pub fn contains(&self, p: &Position) -> bool {
        match self {
            Shape::Polygon { points } => polygon_contains(points, p),
            Shape::Circle { center, radius } => {
                p.distance_to(&Position::new(center[0], center[1])) <= *radius
            }
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
                angle,
            } => {
                if *radius_x <= 0.0 || *radius_y <= 0.0 {
                    return false;
                }
                let (sin, cos) = (-angle.to_radians()).sin_cos();
                let dx = p.x - center[0];
                let dy = p.y - center[1];
                let rx = dx * cos - dy * sin;
                let ry = dx * sin + dy * cos;
                (rx / radius_x).powi(2) + (ry / radius_y).powi(2) <= 1.0
            }
        }
    }
}

fn signed_polygon_area(points: &[[f64; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    acc / 2.0
}

fn polygon_centroid(points: &[[f64; 2]]) -> Position {
    if points.is_empty() {
        return Position::NOT_CODED;
    }
    let area = signed_polygon_area(points);
    if area.abs() < f64::EPSILON {
        // degenerate polygon, fall back to the vertex mean
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        return Position::new(sx / n, sy / n);
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let cross = a[0] * b[1] - b[0] * a[1];
        cx += (a[0] + b[0]) * cross;
        cy += (a[1] + b[1]) * cross;
    }
    Position::new(cx / (6.0 * area), cy / (6.0 * area))
}

fn polygon_contains(points: &[[f64; 2]], p: &Position) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = (points[i][0], points[i][1]);
        let (xj, yj) = (points[j][0], points[j][1]);
        if (yi > p.y) != (yj > p.y) && p.x < (xj - xi) * (p.y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Per-channel configuration, persisted key by key in the channel's metadata section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,

    /// Zone geometry; only meaningful for zone channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,

    /// Opaque presentation-layer settings, stored verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ChannelConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// File-level bookkeeping kept in the `data_config` and `app_config` sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    /// Number of channels ever created; the next channel id
    pub channel_count: i64,
    /// Next id handed to a freshly allocated segment
    pub segment_counter: i64,
    pub saw_first_timestamp: bool,
    pub saw_last_timestamp: bool,
    pub saw_all_timestamps: bool,
    pub format_version: String,
    pub created_at: String,
    #[serde(default)]
    pub pixels_per_meter: f64,
}

impl FileState {
    pub fn new() -> Self {
        Self {
            channel_count: 0,
            segment_counter: 1,
            saw_first_timestamp: false,
            saw_last_timestamp: false,
            saw_all_timestamps: false,
            format_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            pixels_per_meter: 0.0,
        }
    }
}

impl Default for FileState {
    fn default() -> Self {
        Self::new()
    }
}

/// Segment overview (for `info` style listings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: SegmentId,
    pub len: usize,
    pub first: Option<Timestamp>,
    pub last: Option<Timestamp>,
}

/// Channel overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub name: String,
    pub coded_frames: usize,
}

/// In-memory contents used to populate a fresh file in one go
#[derive(Debug, Clone, Default)]
pub struct FileArrays {
    pub video_metadata: BTreeMap<String, serde_yaml::Value>,
    pub saw_all_timestamps: bool,
    /// One vector per segment, the first becomes the primary segment
    pub timestamps: Vec<Vec<Timestamp>>,
    pub event_channels: Vec<(ChannelConfig, Vec<Vec<bool>>)>,
    pub pos_channels: Vec<(ChannelConfig, Vec<Vec<Position>>)>,
    pub zone_channels: Vec<ChannelConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Shape {
        Shape::Polygon {
            points: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
        }
    }

    #[test]
    fn test_polygon_geometry() {
        let shape = square();
        assert_relative_eq!(shape.area(), 16.0);
        let c = shape.centroid();
        assert_relative_eq!(c.x, 2.0);
        assert_relative_eq!(c.y, 2.0);
        assert!(shape.contains(&Position::new(1.0, 3.0)));
        assert!(!shape.contains(&Position::new(5.0, 3.0)));
    }

    #[test]
    fn test_circle_and_ellipse() {
        let circle = Shape::Circle {
            center: [10.0, 10.0],
            radius: 2.0,
        };
        assert_relative_eq!(circle.area(), std::f64::consts::PI * 4.0);
        assert!(circle.contains(&Position::new(11.0, 11.0)));
        assert!(!circle.contains(&Position::new(13.0, 10.0)));

        let ellipse = Shape::Ellipse {
            center: [0.0, 0.0],
            radius_x: 4.0,
            radius_y: 1.0,
            angle: 90.0,
        };
        assert!(ellipse.contains(&Position::new(0.0, 3.5)));
        assert!(!ellipse.contains(&Position::new(3.5, 0.0)));
    }

    #[test]
    fn test_position_sentinel() {
        assert!(!Position::NOT_CODED.is_coded());
        assert!(Position::new(0.0, 0.0).is_coded());
        assert!(Value::Pos(Position::new(3.0, 4.0)).is_set());
        assert!(!Value::Event(false).is_set());
    }

    #[test]
    fn test_shape_yaml_roundtrip() {
        let config = ChannelConfig::named("arena").with_shape(Shape::Circle {
            center: [1.0, 2.0],
            radius: 3.0,
        });
        let text = serde_yaml::to_string(&config).unwrap();
        assert!(text.contains("type: circle"));
        let back: ChannelConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_channel_kind_parse() {
        assert_eq!("pos".parse::<ChannelKind>().unwrap(), ChannelKind::Pos);
        assert!("video".parse::<ChannelKind>().is_err());
    }
}

use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use wardrobe_common::{Point2D, Rectangle, Size};

/// A closed lasso outline in source-image pixel coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePolygon {
    /// Ring vertices; the closing vertex may or may not repeat the first
    pub points: Vec<[f64; 2]>,
}

impl ImagePolygon {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();

        Polygon::new(LineString::new(coords), vec![])
    }

    /// Calculate the enclosed area
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Axis-aligned bounding box, `None` for an empty polygon
    pub fn bounding_box(&self) -> Option<Rectangle> {
        use geo::BoundingRect;
        let rect = self.to_geo_polygon().bounding_rect()?;
        Some(Rectangle::new(
            Point2D::new(rect.min().x, rect.min().y),
            Size::new(rect.width(), rect.height()),
        ))
    }

    /// Shift every vertex by `(dx, dy)`
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            points: self.points.iter().map(|&[x, y]| [x + dx, y + dy]).collect(),
        }
    }

    /// Edges of the ring, including the implicit closing edge
    pub fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }
}

impl FromIterator<Point2D> for ImagePolygon {
    fn from_iter<I: IntoIterator<Item = Point2D>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().map(|p| [p.x, p.y]).collect(),
        }
    }
}

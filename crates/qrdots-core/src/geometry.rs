use serde::{Deserialize, Serialize};

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Four corners locating a detected code within a frame.
/// Corners go clockwise starting at the top-left finder pattern.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quad {
    pub fn new(top_left: Point, top_right: Point, bottom_right: Point, bottom_left: Point) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Axis-aligned quad enclosing all given points.
    /// Used for decoders that report finder centers instead of corners.
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self::new(
            Point::new(min_x, min_y),
            Point::new(max_x, min_y),
            Point::new(max_x, max_y),
            Point::new(min_x, max_y),
        ))
    }

    /// Corners in drawing order TL -> TR -> BR -> BL
    pub fn corners(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Closed outline as edge pairs, last edge returns to the top-left corner
    pub fn edges(&self) -> [(Point, Point); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
}

/// Whether the center of pixel (px, py) lies inside the circle.
pub(crate) fn covers_pixel(cx: f32, cy: f32, radius: f32, px: u32, py: u32) -> bool {
    let dx = px as f32 + 0.5 - cx;
    let dy = py as f32 + 0.5 - cy;
    dx * dx + dy * dy <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_quad() {
        let points = [
            Point::new(10.0, 40.0),
            Point::new(50.0, 12.0),
            Point::new(30.0, 60.0),
        ];
        let quad = Quad::bounding(&points).unwrap();

        assert_eq!(quad.top_left, Point::new(10.0, 12.0));
        assert_eq!(quad.bottom_right, Point::new(50.0, 60.0));
    }

    #[test]
    fn test_bounding_empty() {
        assert!(Quad::bounding(&[]).is_none());
    }

    #[test]
    fn test_edges_close_the_outline() {
        let quad = Quad::bounding(&[Point::new(0.0, 0.0), Point::new(4.0, 4.0)]).unwrap();
        let edges = quad.edges();
        assert_eq!(edges[3].1, edges[0].0);
    }

    #[test]
    fn test_covers_pixel() {
        // circle r=2.52 at (3, 3): pixel (2, 2) center is (2.5, 2.5)
        assert!(covers_pixel(3.0, 3.0, 2.52, 2, 2));
        assert!(!covers_pixel(3.0, 3.0, 2.52, 5, 5));
    }
}

use log::trace;

use crate::{Position, Vector};

#[derive(Debug, Clone, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min: Position,
    pub max: Position,
}

impl BoundingBox {
    pub fn expand(&mut self, other: &BoundingBox) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Position::new(f64::MAX, f64::MAX),
            max: Position::new(f64::MIN, f64::MIN),
        }
    }
}

impl BoundingBox {
    /// Note that a bounding box of 0,0 -> 0,0 is NOT empty
    /// e.g., you could have a shape that defines a rectangle with an origin of 0,0 and a width + height of 0,0.
    ///
    /// Only a bounding box which is the same as the one returned by `default` counts as empty.
    pub fn is_empty(&self) -> bool {
        self.eq(&BoundingBox::default())
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// A square of `size` centered on `center`, e.g. the footprint of a stroke at one point.
    pub fn around(center: Position, size: f64) -> Self {
        let half = size / 2.0;
        Self {
            min: Position::new(center.x - half, center.y - half),
            max: Position::new(center.x + half, center.y + half),
        }
    }

    /// Returns a copy moved by `offset`, empty boxes stay empty.
    pub fn translated(&self, offset: Vector) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        let result = Self {
            min: self.min + offset,
            max: self.max + offset,
        };
        trace!("translated bbox. offset: {:?}, before: {:?}, after: {:?}", offset, self, result);
        result
    }

    /// Returns the geometric center of the bounding box as a Position
    pub fn center(&self) -> Position {
        Position::new(self.min.x + self.max.x, self.min.y + self.max.y) / 2.0
    }

    /// Returns 4 corner points of the bounding box such that the result is useable as a closed path.
    /// ```plaintext
    /// (min_x, min_y) 1 ┌────────────┐ 2 (max_x, min_y)
    ///                  │            │
    /// (min_x, max_y) 4 └────────────┘ 3 (max_x, max_y)
    /// ```
    pub fn vertices(&self) -> Vec<Position> {
        vec![
            Position::new(self.min.x, self.min.y),
            Position::new(self.max.x, self.min.y),
            Position::new(self.max.x, self.max.y),
            Position::new(self.min.x, self.max.y),
        ]
    }

    /// Constructs a bounding box from a list of points
    pub fn from_points(points: &[Position]) -> Self {
        let mut min = Position::new(f64::MAX, f64::MAX);
        let mut max = Position::new(f64::MIN, f64::MIN);

        for position in points {
            min.x = min.x.min(position.x);
            min.y = min.y.min(position.y);
            max.x = max.x.max(position.x);
            max.y = max.y.max(position.y);
        }

        Self {
            min,
            max,
        }
    }
}

#[cfg(test)]
mod bbox_tests {
    use rstest::rstest;

    use super::BoundingBox;
    use crate::{Position, Vector};

    #[rstest]
    #[case(BoundingBox::default(), true)]
    #[case(BoundingBox { min: Position::new(0.0, 0.0), max: Position::new(0.0, 0.0) }, false)]
    #[case(BoundingBox { min: Position::new(-10.0, -10.0), max: Position::new(10.0, 10.0) }, false)]
    pub fn test_is_empty(#[case] input: BoundingBox, #[case] expected: bool) {
        assert_eq!(input.is_empty(), expected);
    }

    #[test]
    pub fn test_translated() {
        let bbox = BoundingBox {
            min: Position::new(1.0, 2.0),
            max: Position::new(3.0, 4.0),
        };

        let moved = bbox.translated(Vector::new(10.0, -2.0));

        assert_eq!(moved.min, Position::new(11.0, 0.0));
        assert_eq!(moved.max, Position::new(13.0, 2.0));
    }

    #[test]
    pub fn test_translated_empty_stays_empty() {
        let moved = BoundingBox::default().translated(Vector::new(10.0, 10.0));
        assert!(moved.is_empty());
    }

    #[test]
    pub fn test_expand_with_points() {
        // given
        let mut bbox = BoundingBox::around(Position::new(0.0, 0.0), 1.0);

        // when
        bbox.expand(&BoundingBox::from_points(&[Position::new(5.0, -3.0), Position::new(2.0, 1.0)]));

        // then
        assert_eq!(bbox.min, Position::new(-0.5, -3.0));
        assert_eq!(bbox.max, Position::new(5.0, 1.0));
        assert_eq!(bbox.width(), 5.5);
        assert_eq!(bbox.height(), 4.0);
    }

    #[rstest]
    #[case((0.0, 0.0), (10.0, 10.0), (5.0, 5.0))] // Case 1: Origin 0, 10x10
    #[case((10.0, 10.0), (10.0, 10.0), (15.0, 15.0))] // Case 2: Origin 10, 10x10
    #[case((0.0, 0.0), (5.0, 10.0), (2.5, 5.0))] // Case 3: Origin 0, 5x10
    #[case((10.0, 10.0), (10.0, 5.0), (15.0, 12.5))] // Case 4: Origin 10, 10x5
    fn test_geometric_center(#[case] origin: (f64, f64), #[case] size: (f64, f64), #[case] expected: (f64, f64)) {
        // Create bounding box from origin and size
        let bbox = BoundingBox {
            min: Position::new(origin.0, origin.1),
            max: Position::new(origin.0 + size.0, origin.1 + size.1),
        };

        let center = bbox.center();

        // Compare with precision to handle floating-point numbers
        let epsilon = 1e-9;
        assert!(
            (center.x - expected.0).abs() < epsilon,
            "X mismatch: expected {}, got {}",
            expected.0,
            center.x
        );
        assert!(
            (center.y - expected.1).abs() < epsilon,
            "Y mismatch: expected {}, got {}",
            expected.1,
            center.y
        );
        assert_eq!(bbox.vertices().len(), 4);
    }
}

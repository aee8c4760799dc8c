pub type Vector = nalgebra::Vector2<f64>;
pub type Position = nalgebra::Point2<f64>;

pub trait ToVector {
    fn to_vector(self) -> Vector;
}

impl ToVector for Position {
    fn to_vector(self) -> Vector {
        Vector::new(self.x, self.y)
    }
}

/// Counter-clockwise rotation about the origin.
pub trait RotateAboutOrigin {
    fn rotate_degrees(self, degrees: f64) -> Self;
}

impl RotateAboutOrigin for Position {
    fn rotate_degrees(self, degrees: f64) -> Self {
        if degrees == 0.0 {
            return self;
        }
        let (sin_theta, cos_theta) = degrees.to_radians().sin_cos();
        Position::new(
            self.x * cos_theta - self.y * sin_theta,
            self.x * sin_theta + self.y * cos_theta,
        )
    }
}

pub fn distance(a: Position, b: Position) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

pub mod deduplicate {
    use crate::Position;

    pub trait DedupEpsilon {
        fn dedup_with_epsilon(self, epsilon: f64) -> Self;
    }

    impl DedupEpsilon for Vec<Position> {
        fn dedup_with_epsilon(mut self, epsilon: f64) -> Self {
            if self.len() < 2 {
                return self;
            }

            let mut to_remove = Vec::new();
            let mut last_index = 0;

            for i in 1..self.len() {
                let a = &self[last_index];
                let b = &self[i];
                if (a.x - b.x).abs() < epsilon && (a.y - b.y).abs() < epsilon {
                    to_remove.push(i);
                } else {
                    last_index = i;
                }
            }

            // a closing vertex which repeats the first one is implied by the polygon
            let last_index = self.len() - 1;
            if !to_remove.contains(&last_index) {
                let (first, last) = (&self[0], &self[last_index]);
                if (first.x - last.x).abs() < epsilon && (first.y - last.y).abs() < epsilon {
                    to_remove.push(last_index);
                }
            }

            if self.len() - to_remove.len() < 3 {
                return self; // Too few remaining
            }

            for &i in to_remove.iter().rev() {
                self.remove(i);
            }

            self
        }
    }

}

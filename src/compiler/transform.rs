use std::f64::consts::PI;

use crate::geometry::BoundingBox;
use crate::rvmc::{Geometry, Shape};
use crate::spacial::RotateAboutOrigin;
use crate::state::ObjectTransform;
use crate::Position;

/// Applies the geometric part of an object transform about the aperture origin: mirroring, then scaling,
/// then counter-clockwise rotation. Polarity is applied by the paste, not here.
pub trait GeometricTransform {
    fn apply_to_position(&self, position: Position) -> Position;
    fn apply_to_angle(&self, angle: f64) -> f64;
    fn apply_to_shape(&self, shape: &Shape) -> Shape;
}

impl GeometricTransform for ObjectTransform {
    fn apply_to_position(&self, position: Position) -> Position {
        let mirrored = Position::new(
            if self.mirroring.mirrors_x() { -position.x } else { position.x },
            if self.mirroring.mirrors_y() { -position.y } else { position.y },
        );
        (mirrored * self.scale).rotate_degrees(self.rotation)
    }

    fn apply_to_angle(&self, angle: f64) -> f64 {
        let angle = match (self.mirroring.mirrors_x(), self.mirroring.mirrors_y()) {
            (false, false) => angle,
            (true, false) => PI - angle,
            (false, true) => -angle,
            (true, true) => angle + PI,
        };
        angle + self.rotation.to_radians()
    }

    fn apply_to_shape(&self, shape: &Shape) -> Shape {
        let geometry = match &shape.geometry {
            Geometry::Circle {
                center,
                diameter,
            } => Geometry::Circle {
                center: self.apply_to_position(*center),
                diameter: diameter * self.scale,
            },
            Geometry::Rectangle {
                origin,
                width,
                height,
            } => {
                let corners = BoundingBox {
                    min: *origin,
                    max: Position::new(origin.x + width, origin.y + height),
                }
                .vertices()
                .into_iter()
                .map(|corner| self.apply_to_position(corner))
                .collect::<Vec<_>>();

                match self.rotation % 90.0 == 0.0 {
                    true => {
                        let bbox = BoundingBox::from_points(&corners);
                        Geometry::Rectangle {
                            origin: bbox.min,
                            width: bbox.width(),
                            height: bbox.height(),
                        }
                    }
                    false => Geometry::Polygon {
                        vertices: corners,
                    },
                }
            }
            Geometry::Polygon {
                vertices,
            } => Geometry::Polygon {
                vertices: vertices
                    .iter()
                    .map(|vertex| self.apply_to_position(*vertex))
                    .collect(),
            },
            Geometry::Line {
                start,
                end,
                width,
            } => Geometry::Line {
                start: self.apply_to_position(*start),
                end: self.apply_to_position(*end),
                width: width * self.scale,
            },
            Geometry::Arc {
                center,
                radius,
                start_angle,
                sweep_angle,
                width,
            } => {
                // a single mirror axis reverses the direction of travel
                let sweep_angle = match self.mirroring.mirrors_x() != self.mirroring.mirrors_y() {
                    true => -sweep_angle,
                    false => *sweep_angle,
                };
                Geometry::Arc {
                    center: self.apply_to_position(*center),
                    radius: radius * self.scale,
                    start_angle: self.apply_to_angle(*start_angle),
                    sweep_angle,
                    width: width * self.scale,
                }
            }
        };

        Shape::new(geometry, shape.is_negative)
    }
}

#[cfg(test)]
mod transform_tests {
    use std::f64::consts::FRAC_PI_2;

    use rstest::rstest;

    use super::*;
    use crate::rvmc::arc_points;
    use crate::state::Mirroring;
    use crate::ToVector;

    const EPSILON: f64 = 1e-9;

    fn assert_close(actual: Position, expected: Position) {
        assert!(
            (actual.x - expected.x).abs() < EPSILON && (actual.y - expected.y).abs() < EPSILON,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[rstest]
    #[case(Mirroring::None, 0.0, 1.0, (2.0, 1.0))]
    #[case(Mirroring::X, 0.0, 1.0, (-2.0, 1.0))]
    #[case(Mirroring::Y, 0.0, 1.0, (2.0, -1.0))]
    #[case(Mirroring::XY, 0.0, 1.0, (-2.0, -1.0))]
    #[case(Mirroring::None, 90.0, 1.0, (-1.0, 2.0))]
    #[case(Mirroring::None, 0.0, 2.0, (4.0, 2.0))]
    // mirror first, then scale, then rotate
    #[case(Mirroring::X, 90.0, 2.0, (-2.0, -4.0))]
    fn test_position_transform(
        #[case] mirroring: Mirroring,
        #[case] rotation: f64,
        #[case] scale: f64,
        #[case] expected: (f64, f64),
    ) {
        let transform = ObjectTransform {
            mirroring,
            rotation,
            scale,
            ..ObjectTransform::default()
        };

        let actual = transform.apply_to_position(Position::new(2.0, 1.0));

        assert_close(actual, Position::new(expected.0, expected.1));
    }

    #[rstest]
    #[case(90.0)]
    #[case(180.0)]
    fn test_rectangle_stays_rectangle_for_right_angles(#[case] rotation: f64) {
        // given
        let transform = ObjectTransform {
            rotation,
            ..ObjectTransform::default()
        };
        let shape = Shape::positive(Geometry::Rectangle {
            origin: Position::new(0.0, 0.0),
            width: 2.0,
            height: 1.0,
        });

        // when
        let transformed = transform.apply_to_shape(&shape);

        // then
        let Geometry::Rectangle {
            width,
            height,
            ..
        } = transformed.geometry
        else {
            panic!("expected a rectangle, got {:?}", transformed.geometry);
        };
        let (expected_width, expected_height) = if rotation == 90.0 { (1.0, 2.0) } else { (2.0, 1.0) };
        assert!((width - expected_width).abs() < EPSILON);
        assert!((height - expected_height).abs() < EPSILON);
    }

    #[test]
    fn test_rotated_rectangle_becomes_polygon() {
        let transform = ObjectTransform {
            rotation: 45.0,
            ..ObjectTransform::default()
        };
        let shape = Shape::negative(Geometry::Rectangle {
            origin: Position::new(-1.0, -1.0),
            width: 2.0,
            height: 2.0,
        });

        let transformed = transform.apply_to_shape(&shape);

        assert!(transformed.is_negative);
        let Geometry::Polygon {
            vertices,
        } = transformed.geometry
        else {
            panic!("expected a polygon");
        };
        assert_eq!(vertices.len(), 4);
        assert_close(vertices[0], Position::new(0.0, -(2.0_f64.sqrt())));
    }

    #[rstest]
    #[case(Mirroring::X)]
    #[case(Mirroring::Y)]
    #[case(Mirroring::XY)]
    fn test_mirrored_arc_follows_mirrored_points(#[case] mirroring: Mirroring) {
        // given
        let transform = ObjectTransform {
            mirroring,
            rotation: 30.0,
            ..ObjectTransform::default()
        };
        let center = Position::new(1.0, 2.0);
        let (radius, start_angle, sweep_angle) = (1.5, 0.25, FRAC_PI_2);
        let arc = Shape::positive(Geometry::Arc {
            center,
            radius,
            start_angle,
            sweep_angle,
            width: 0.1,
        });

        // when
        let transformed = transform.apply_to_shape(&arc);

        // then
        // the transformed arc passes through the transformed start and end points
        let Geometry::Arc {
            center: new_center,
            radius: new_radius,
            start_angle: new_start,
            sweep_angle: new_sweep,
            ..
        } = transformed.geometry
        else {
            panic!("expected an arc");
        };

        let original = arc_points(radius, start_angle, sweep_angle);
        let mapped = arc_points(new_radius, new_start, new_sweep);

        for (before, after) in [(original[0], mapped[0]), (original[31], mapped[31])] {
            let expected = transform.apply_to_position(center + before.to_vector());
            assert_close(new_center + after.to_vector(), expected);
        }
    }
}

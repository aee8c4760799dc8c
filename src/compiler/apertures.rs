//! Native geometry of the standard aperture templates, centered on the aperture origin.

use log::trace;

use crate::ast::{Circle, Polygon, Rectangular};
use crate::geometry::regular_polygon_vertices;
use crate::rvmc::{Geometry, Shape};
use crate::Position;

pub fn circle_shapes(circle: &Circle) -> Vec<Shape> {
    let mut shapes = vec![Shape::positive(Geometry::Circle {
        center: Position::origin(),
        diameter: circle.diameter,
    })];
    push_hole(&mut shapes, circle.hole_diameter, circle.diameter);
    shapes
}

pub fn rectangle_shapes(rectangle: &Rectangular) -> Vec<Shape> {
    let mut shapes = vec![centered_rectangle(rectangle.x, rectangle.y)];
    push_hole(&mut shapes, rectangle.hole_diameter, rectangle.x.min(rectangle.y));
    shapes
}

/// A rectangle with a circle on each of its short ends.
pub fn obround_shapes(obround: &Rectangular) -> Vec<Shape> {
    let Rectangular {
        x,
        y,
        hole_diameter,
    } = *obround;

    let (rectangle_width, rectangle_height, circle_offsets) = if x > y {
        let rectangle_width = x - y;
        let offset = rectangle_width / 2.0;
        (rectangle_width, y, [(offset, 0.0), (-offset, 0.0)])
    } else {
        let rectangle_height = y - x;
        let offset = rectangle_height / 2.0;
        (x, rectangle_height, [(0.0, offset), (0.0, -offset)])
    };

    let mut shapes = vec![];
    if rectangle_width > 0.0 && rectangle_height > 0.0 {
        shapes.push(centered_rectangle(rectangle_width, rectangle_height));
    }

    let diameter = x.min(y);
    for (dx, dy) in circle_offsets {
        shapes.push(Shape::positive(Geometry::Circle {
            center: Position::new(dx, dy),
            diameter,
        }));
    }
    trace!("obround {}x{} as {} shapes", x, y, shapes.len());

    push_hole(&mut shapes, hole_diameter, diameter);
    shapes
}

pub fn polygon_shapes(polygon: &Polygon) -> Vec<Shape> {
    let vertices = regular_polygon_vertices(
        polygon.outer_diameter,
        polygon.vertices.max(3) as usize,
        polygon.rotation.unwrap_or(0.0),
    );
    let mut shapes = vec![Shape::positive(Geometry::Polygon {
        vertices,
    })];
    push_hole(&mut shapes, polygon.hole_diameter, polygon.outer_diameter);
    shapes
}

fn centered_rectangle(width: f64, height: f64) -> Shape {
    Shape::positive(Geometry::Rectangle {
        origin: Position::new(-width / 2.0, -height / 2.0),
        width,
        height,
    })
}

/// Holes never exceed the dimension of the shape they are cut from.
fn push_hole(shapes: &mut Vec<Shape>, hole_diameter: Option<f64>, limit: f64) {
    if let Some(hole_diameter) = hole_diameter.filter(|diameter| *diameter > 0.0) {
        shapes.push(Shape::negative(Geometry::Circle {
            center: Position::origin(),
            diameter: hole_diameter.min(limit),
        }));
    }
}

#[cfg(test)]
mod aperture_tests {
    use rstest::rstest;

    use super::*;
    use crate::rvmc::WithBoundingBox;

    #[test]
    fn test_circle_with_hole() {
        // given
        let circle = Circle {
            diameter: 1.0,
            hole_diameter: Some(0.4),
        };

        // when
        let shapes = circle_shapes(&circle);

        // then
        assert_eq!(shapes, vec![
            Shape::positive(Geometry::Circle {
                center: Position::origin(),
                diameter: 1.0,
            }),
            Shape::negative(Geometry::Circle {
                center: Position::origin(),
                diameter: 0.4,
            }),
        ]);
    }

    #[test]
    fn test_hole_is_clamped() {
        let rectangle = Rectangular {
            x: 2.0,
            y: 1.0,
            hole_diameter: Some(5.0),
        };

        let shapes = rectangle_shapes(&rectangle);

        assert_eq!(shapes[1], Shape::negative(Geometry::Circle {
            center: Position::origin(),
            diameter: 1.0,
        }));
    }

    #[rstest]
    #[case(3.0, 1.0)]
    #[case(1.0, 3.0)]
    fn test_obround_extent(#[case] x: f64, #[case] y: f64) {
        // given
        let obround = Rectangular {
            x,
            y,
            hole_diameter: None,
        };

        // when
        let shapes = obround_shapes(&obround);

        // then
        assert_eq!(shapes.len(), 3);
        let mut bbox = shapes[0].bounding_box();
        for shape in &shapes[1..] {
            bbox.expand(&shape.bounding_box());
        }
        assert_eq!(bbox.width(), x);
        assert_eq!(bbox.height(), y);
    }

    #[test]
    fn test_round_obround_is_two_circles() {
        let obround = Rectangular {
            x: 1.0,
            y: 1.0,
            hole_diameter: None,
        };

        let shapes = obround_shapes(&obround);

        assert_eq!(shapes.len(), 2);
        assert!(shapes
            .iter()
            .all(|shape| matches!(shape.geometry, Geometry::Circle { .. })));
    }

    #[test]
    fn test_polygon_aperture() {
        let polygon = Polygon {
            outer_diameter: 2.0,
            vertices: 6,
            rotation: Some(30.0),
            hole_diameter: Some(0.5),
        };

        let shapes = polygon_shapes(&polygon);

        assert_eq!(shapes.len(), 2);
        let Geometry::Polygon {
            vertices,
        } = &shapes[0].geometry
        else {
            panic!("expected a polygon");
        };
        assert_eq!(vertices.len(), 6);
        assert!(shapes[1].is_negative);
    }
}

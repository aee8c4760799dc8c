//! Builders for command nodes, used by the tests and benchmarks.

use crate::ast::{
    ApertureDefinition, ApertureId, ApertureTemplate, Circle, Coordinates, MacroDefinition, MacroStatement, Node,
    Rectangular,
};
use crate::coordinate::{Axis, CoordinateFormat, PackedCoordinate, ZeroSuppression};

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

/// `%FSLAX24Y24*%`
pub fn format_2_4() -> CoordinateFormat {
    CoordinateFormat::absolute(ZeroSuppression::SkipLeading, 2, 4)
}

pub fn packed(value: f64) -> PackedCoordinate {
    format_2_4()
        .pack(Axis::X, value)
        .unwrap()
}

fn coordinates(x: f64, y: f64) -> Coordinates {
    Coordinates {
        x: Some(packed(x)),
        y: Some(packed(y)),
        ..Coordinates::default()
    }
}

pub fn aperture(code: u32, template: ApertureTemplate) -> Node {
    Node::ApertureDefinition(ApertureDefinition {
        id: ApertureId::new(code),
        template,
    })
}

pub fn circle_aperture(code: u32, diameter: f64) -> Node {
    aperture(
        code,
        ApertureTemplate::Circle(Circle {
            diameter,
            hole_diameter: None,
        }),
    )
}

pub fn rectangle_aperture(code: u32, x: f64, y: f64) -> Node {
    aperture(
        code,
        ApertureTemplate::Rectangle(Rectangular {
            x,
            y,
            hole_diameter: None,
        }),
    )
}

pub fn macro_aperture(code: u32, name: &str, parameters: &[f64]) -> Node {
    aperture(code, ApertureTemplate::Macro {
        name: name.to_string(),
        parameters: parameters.to_vec(),
    })
}

pub fn unsupported_aperture(code: u32) -> Node {
    aperture(code, ApertureTemplate::Unsupported {
        name: "XYZ".to_string(),
    })
}

pub fn macro_definition(name: &str, body: Vec<MacroStatement>) -> Node {
    Node::MacroDefinition(MacroDefinition {
        name: name.to_string(),
        body,
    })
}

pub fn select(code: u32) -> Node {
    Node::SelectAperture(ApertureId::new(code))
}

pub fn flash(x: f64, y: f64) -> Node {
    Node::Flash(coordinates(x, y))
}

pub fn move_to(x: f64, y: f64) -> Node {
    Node::Move(coordinates(x, y))
}

pub fn draw_to(x: f64, y: f64) -> Node {
    Node::Draw(coordinates(x, y))
}

/// A draw with an arc center offset.
pub fn arc_to(x: f64, y: f64, i: f64, j: f64) -> Node {
    Node::Draw(Coordinates {
        i: Some(packed(i)),
        j: Some(packed(j)),
        ..coordinates(x, y)
    })
}

/// A closed rectangular region contour, starting and ending at `(x1, y1)`.
pub fn rectangle_region(x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<Node> {
    vec![
        Node::BeginRegion,
        move_to(x1, y1),
        draw_to(x2, y1),
        draw_to(x2, y2),
        draw_to(x1, y2),
        draw_to(x1, y1),
        Node::EndRegion,
    ]
}

//! Renderer-agnostic layered draw commands.
//!
//! An [`Rvmc`] is a flat list of `StartLayer .. EndLayer` groups. A layer only ever pastes layers which appear
//! earlier in the list, the last group is always the main layer.

use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

use lyon::tessellation::TessellationError;

use crate::ast::ApertureId;
use crate::geometry::{fan_polygon, is_convex, tessellate_polygon, BoundingBox, PolygonMesh};
use crate::{Position, ToVector, Vector};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerId(String);

impl LayerId {
    pub const MAIN: &'static str = "main";

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ApertureId> for LayerId {
    fn from(value: &ApertureId) -> Self {
        Self(value.to_string())
    }
}

impl Display for LayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape geometry in layer coordinates. Angles are in radians, a positive sweep is counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    Circle {
        center: Position,
        diameter: f64,
    },
    /// Axis aligned, `origin` is the lower-left corner.
    Rectangle {
        origin: Position,
        width: f64,
        height: f64,
    },
    Polygon {
        vertices: Vec<Position>,
    },
    Line {
        start: Position,
        end: Position,
        width: f64,
    },
    Arc {
        center: Position,
        radius: f64,
        start_angle: f64,
        sweep_angle: f64,
        width: f64,
    },
}

impl Geometry {
    pub fn translated(&self, offset: Vector) -> Self {
        match self {
            Geometry::Circle {
                center,
                diameter,
            } => Geometry::Circle {
                center: center + offset,
                diameter: *diameter,
            },
            Geometry::Rectangle {
                origin,
                width,
                height,
            } => Geometry::Rectangle {
                origin: origin + offset,
                width: *width,
                height: *height,
            },
            Geometry::Polygon {
                vertices,
            } => Geometry::Polygon {
                vertices: vertices
                    .iter()
                    .map(|vertex| vertex + offset)
                    .collect(),
            },
            Geometry::Line {
                start,
                end,
                width,
            } => Geometry::Line {
                start: start + offset,
                end: end + offset,
                width: *width,
            },
            Geometry::Arc {
                center,
                radius,
                start_angle,
                sweep_angle,
                width,
            } => Geometry::Arc {
                center: center + offset,
                radius: *radius,
                start_angle: *start_angle,
                sweep_angle: *sweep_angle,
                width: *width,
            },
        }
    }
}

/// Points along an arc, relative to its center.
///
/// A zero sweep, or a sweep of a full turn, is treated as a full circle.
pub fn arc_points(radius: f64, start_angle: f64, sweep_angle: f64) -> Vec<Position> {
    const EPSILON: f64 = 1e-10;
    let is_full_circle = sweep_angle.abs() < EPSILON || (sweep_angle.abs() - 2.0 * PI).abs() < EPSILON;

    let steps = if is_full_circle { 33 } else { 32 };
    let effective_sweep = if is_full_circle { 2.0 * PI } else { sweep_angle };
    let angle_step = effective_sweep / (steps - 1) as f64;

    let mut points: Vec<Position> = (0..steps)
        .map(|i| {
            let angle = start_angle + angle_step * i as f64;
            Position::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect();

    if is_full_circle {
        points[steps - 1] = points[0];
    }

    points
}

pub trait WithBoundingBox {
    fn bounding_box(&self) -> BoundingBox;
}

impl WithBoundingBox for Geometry {
    fn bounding_box(&self) -> BoundingBox {
        match self {
            Geometry::Circle {
                center,
                diameter,
            } => BoundingBox::around(*center, *diameter),
            Geometry::Rectangle {
                origin,
                width,
                height,
            } => BoundingBox {
                min: *origin,
                max: Position::new(origin.x + width, origin.y + height),
            },
            Geometry::Polygon {
                vertices,
            } => BoundingBox::from_points(vertices),
            Geometry::Line {
                start,
                end,
                width,
            } => {
                let mut bbox = BoundingBox::around(*start, *width);
                bbox.expand(&BoundingBox::around(*end, *width));
                bbox
            }
            Geometry::Arc {
                center,
                radius,
                start_angle,
                sweep_angle,
                width,
            } => {
                // an axis aligned square of the stroke width at each sampled point, close enough for layout
                let mut bbox = BoundingBox::default();
                for point in arc_points(*radius, *start_angle, *sweep_angle) {
                    bbox.expand(&BoundingBox::around(center + point.to_vector(), *width));
                }
                bbox
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub geometry: Geometry,
    /// Clear polarity, or a cut-out, removes previously drawn material.
    pub is_negative: bool,
}

impl Shape {
    pub fn new(geometry: Geometry, is_negative: bool) -> Self {
        Self {
            geometry,
            is_negative,
        }
    }

    pub fn positive(geometry: Geometry) -> Self {
        Self::new(geometry, false)
    }

    pub fn negative(geometry: Geometry) -> Self {
        Self::new(geometry, true)
    }

    pub fn translated(&self, offset: Vector) -> Self {
        Self::new(self.geometry.translated(offset), self.is_negative)
    }

    /// Triangulates polygon geometry, other geometry kinds return `None`.
    pub fn tessellate(&self) -> Option<Result<PolygonMesh, TessellationError>> {
        match &self.geometry {
            Geometry::Polygon {
                vertices,
            } if is_convex(vertices) => Some(Ok(fan_polygon(vertices))),
            Geometry::Polygon {
                vertices,
            } => Some(tessellate_polygon(vertices)),
            _ => None,
        }
    }
}

impl WithBoundingBox for Shape {
    fn bounding_box(&self) -> BoundingBox {
        self.geometry.bounding_box()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PasteLayer {
    pub source: LayerId,
    pub center: Position,
    pub is_negative: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RvmcCommand {
    StartLayer {
        id: LayerId,
        bounding_box: Option<BoundingBox>,
    },
    Shape(Shape),
    PasteLayer(PasteLayer),
    EndLayer,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rvmc {
    commands: Vec<RvmcCommand>,
}

impl Rvmc {
    pub fn new(commands: Vec<RvmcCommand>) -> Self {
        Self {
            commands,
        }
    }

    pub fn commands(&self) -> &[RvmcCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<RvmcCommand> {
        self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Layer ids in emission order.
    pub fn layer_ids(&self) -> Vec<&LayerId> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RvmcCommand::StartLayer {
                    id, ..
                } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// The commands between a layer's `StartLayer` and `EndLayer`.
    pub fn layer(&self, id: &LayerId) -> Option<&[RvmcCommand]> {
        let start = self.commands.iter().position(|command| {
            matches!(command, RvmcCommand::StartLayer { id: candidate, .. } if candidate == id)
        })?;
        let length = self.commands[start + 1..]
            .iter()
            .position(|command| matches!(command, RvmcCommand::EndLayer))?;

        Some(&self.commands[start + 1..start + 1 + length])
    }

    pub fn layer_bounding_box(&self, id: &LayerId) -> Option<&BoundingBox> {
        self.commands
            .iter()
            .find_map(|command| match command {
                RvmcCommand::StartLayer {
                    id: candidate,
                    bounding_box,
                } if candidate == id => bounding_box.as_ref(),
                _ => None,
            })
    }

    pub fn shapes(&self, id: &LayerId) -> Vec<&Shape> {
        self.layer(id)
            .unwrap_or_default()
            .iter()
            .filter_map(|command| match command {
                RvmcCommand::Shape(shape) => Some(shape),
                _ => None,
            })
            .collect()
    }

    pub fn pastes(&self, id: &LayerId) -> Vec<&PasteLayer> {
        self.layer(id)
            .unwrap_or_default()
            .iter()
            .filter_map(|command| match command {
                RvmcCommand::PasteLayer(paste) => Some(paste),
                _ => None,
            })
            .collect()
    }
}

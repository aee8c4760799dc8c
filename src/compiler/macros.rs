//! Aperture macro instantiation.
//!
//! Each primitive is evaluated in the variable scope built up by the assignments preceding it, the resulting
//! shapes are centered on the macro origin.

use std::f64::consts::{FRAC_PI_2, TAU};

use log::{trace, warn};

use crate::ast::{MacroDefinition, MacroPrimitive, MacroStatement};
use crate::error::CompileError;
use crate::expressions::{evaluate_expression, Expression, MacroContext};
use crate::geometry::{regular_polygon_vertices, BoundingBox};
use crate::rvmc::{Geometry, Shape};
use crate::spacial::deduplicate::DedupEpsilon;
use crate::spacial::RotateAboutOrigin;
use crate::types::Exposure;
use crate::{Position, Vector};

/// Points per quarter turn when sampling the curved edges of a thermal.
const THERMAL_ARC_STEPS: usize = 16;

pub struct MacroEvaluator<'a> {
    definition: &'a MacroDefinition,
    context: MacroContext,
}

impl<'a> MacroEvaluator<'a> {
    /// `parameters` are bound to `$1..$n`.
    pub fn new(definition: &'a MacroDefinition, parameters: &[f64]) -> Self {
        Self {
            definition,
            context: MacroContext::from_parameters(parameters),
        }
    }

    #[profiling::function]
    pub fn evaluate(mut self) -> Result<Vec<Shape>, CompileError> {
        let definition = self.definition;
        let mut shapes = vec![];
        for statement in &definition.body {
            match statement {
                MacroStatement::Comment(comment) => trace!("macro comment: {}", comment),
                MacroStatement::Assignment {
                    variable,
                    expression,
                } => {
                    let value = evaluate_expression(expression, &self.context)?;
                    trace!("${} = {}", variable, value);
                    self.context.put(*variable, value)?;
                }
                MacroStatement::Primitive(primitive) => {
                    let primitive_shapes = self.evaluate_primitive(primitive)?;
                    trace!("primitive {} produced {} shape(s)", primitive.code(), primitive_shapes.len());
                    shapes.extend(primitive_shapes);
                }
            }
        }
        Ok(shapes)
    }

    fn value(&self, expression: &Expression) -> Result<f64, CompileError> {
        Ok(evaluate_expression(expression, &self.context)?)
    }

    fn exposure(&self, expression: &Expression) -> Result<Exposure, CompileError> {
        Ok(Exposure::from(self.value(expression)?))
    }

    fn position(&self, x: &Expression, y: &Expression) -> Result<Position, CompileError> {
        Ok(Position::new(self.value(x)?, self.value(y)?))
    }

    fn evaluate_primitive(&self, primitive: &MacroPrimitive) -> Result<Vec<Shape>, CompileError> {
        match primitive {
            MacroPrimitive::Circle {
                exposure,
                diameter,
                center_x,
                center_y,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("circle");

                let rotation = match rotation {
                    Some(rotation) => self.value(rotation)?,
                    None => 0.0,
                };
                let center = self
                    .position(center_x, center_y)?
                    .rotate_degrees(rotation);

                Ok(vec![Shape::new(
                    Geometry::Circle {
                        center,
                        diameter: self.value(diameter)?.abs(),
                    },
                    self.exposure(exposure)?.is_negative(),
                )])
            }
            MacroPrimitive::VectorLine {
                exposure,
                width,
                start_x,
                start_y,
                end_x,
                end_y,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("vector line");

                let start = self.position(start_x, start_y)?;
                let end = self.position(end_x, end_y)?;
                let width = self.value(width)?;

                let direction = end - start;
                let length = direction.x.hypot(direction.y);
                if length == 0.0 {
                    warn!("zero length vector line in macro '{}', ignoring", self.definition.name);
                    return Ok(vec![]);
                }
                // the line has square ends, it is a rectangle along its direction
                let normal = Vector::new(-direction.y, direction.x) * (width / 2.0 / length);
                let corners = vec![start - normal, end - normal, end + normal, start + normal];

                Ok(vec![polygon(
                    corners,
                    self.value(rotation)?,
                    self.exposure(exposure)?,
                )])
            }
            MacroPrimitive::CenterLine {
                exposure,
                width,
                height,
                center_x,
                center_y,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("center line");

                let (width, height) = (self.value(width)?, self.value(height)?);
                let center = self.position(center_x, center_y)?;
                let origin = Position::new(center.x - width / 2.0, center.y - height / 2.0);

                Ok(vec![rectangle(
                    origin,
                    width,
                    height,
                    self.value(rotation)?,
                    self.exposure(exposure)?,
                )])
            }
            MacroPrimitive::LowerLeftLine {
                exposure,
                width,
                height,
                x,
                y,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("lower left line");

                Ok(vec![rectangle(
                    self.position(x, y)?,
                    self.value(width)?,
                    self.value(height)?,
                    self.value(rotation)?,
                    self.exposure(exposure)?,
                )])
            }
            MacroPrimitive::Outline {
                exposure,
                points,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("outline");

                let vertices = points
                    .iter()
                    .map(|(x, y)| self.position(x, y))
                    .collect::<Result<Vec<_>, _>>()?
                    .dedup_with_epsilon(1e-6);

                if vertices.len() < 3 {
                    warn!(
                        "outline in macro '{}' has less than 3 distinct points, ignoring",
                        self.definition.name
                    );
                    return Ok(vec![]);
                }

                Ok(vec![polygon(
                    vertices,
                    self.value(rotation)?,
                    self.exposure(exposure)?,
                )])
            }
            MacroPrimitive::Polygon {
                exposure,
                vertices,
                center_x,
                center_y,
                diameter,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("polygon");

                let count = self.value(vertices)?.round().max(3.0).min(12.0) as usize;
                let center = self.position(center_x, center_y)?;
                let vertices = regular_polygon_vertices(self.value(diameter)?, count, 0.0)
                    .into_iter()
                    .map(|vertex| vertex + center.coords)
                    .collect();

                Ok(vec![polygon(
                    vertices,
                    self.value(rotation)?,
                    self.exposure(exposure)?,
                )])
            }
            MacroPrimitive::Moire {
                center_x,
                center_y,
                outer_diameter,
                ring_thickness,
                gap,
                max_rings,
                crosshair_thickness,
                crosshair_length,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("moire");

                let rotation = self.value(rotation)?;
                let center = self.position(center_x, center_y)?;
                let rotated_center = center.rotate_degrees(rotation);
                let (outer_diameter, ring_thickness, gap) =
                    (self.value(outer_diameter)?, self.value(ring_thickness)?, self.value(gap)?);
                let max_rings = self.value(max_rings)?.round().max(0.0) as usize;

                let mut shapes = vec![];
                for ring in 0..max_rings {
                    let outer = outer_diameter - 2.0 * ring as f64 * (ring_thickness + gap);
                    if outer <= 0.0 {
                        break;
                    }
                    let inner = (outer - 2.0 * ring_thickness).max(0.0);
                    let geometry = match inner == 0.0 {
                        true => Geometry::Circle {
                            center: rotated_center,
                            diameter: outer,
                        },
                        false => Geometry::Arc {
                            center: rotated_center,
                            radius: (outer + inner) / 4.0,
                            start_angle: 0.0,
                            sweep_angle: TAU,
                            width: (outer - inner) / 2.0,
                        },
                    };
                    shapes.push(Shape::positive(geometry));
                    // every further ring would repeat this one
                    if ring_thickness + gap <= 0.0 {
                        break;
                    }
                }

                let (thickness, length) = (self.value(crosshair_thickness)?, self.value(crosshair_length)?);
                if thickness > 0.0 && length > 0.0 {
                    for (width, height) in [(length, thickness), (thickness, length)] {
                        let origin = Position::new(center.x - width / 2.0, center.y - height / 2.0);
                        shapes.push(rectangle(origin, width, height, rotation, Exposure::Add));
                    }
                }

                Ok(shapes)
            }
            MacroPrimitive::Thermal {
                center_x,
                center_y,
                outer_diameter,
                inner_diameter,
                gap,
                rotation,
            } => {
                #[cfg(feature = "profile-primitives")]
                profiling::scope!("thermal");

                let center = self.position(center_x, center_y)?;
                let outer_radius = self.value(outer_diameter)? / 2.0;
                let inner_radius = (self.value(inner_diameter)? / 2.0).max(0.0);
                let half_gap = self.value(gap)? / 2.0;
                let rotation = self.value(rotation)?;

                if outer_radius <= inner_radius || half_gap >= outer_radius {
                    warn!("degenerate thermal in macro '{}', ignoring", self.definition.name);
                    return Ok(vec![]);
                }

                Ok(thermal_sectors(center, outer_radius, inner_radius, half_gap)
                    .into_iter()
                    .map(|sector| polygon(sector, rotation, Exposure::Add))
                    .collect())
            }
        }
    }
}

/// The four solid parts of a thermal, each an annular sector trimmed by half the gap on both sides.
fn thermal_sectors(center: Position, outer_radius: f64, inner_radius: f64, half_gap: f64) -> Vec<Vec<Position>> {
    let outer_trim = (half_gap / outer_radius).asin();

    (0..4)
        .map(|quadrant| {
            let base = quadrant as f64 * FRAC_PI_2;
            let outer = arc(center, outer_radius, base + outer_trim, base + FRAC_PI_2 - outer_trim);

            let inner = match half_gap < inner_radius {
                true => {
                    let inner_trim = (half_gap / inner_radius).asin();
                    arc(center, inner_radius, base + FRAC_PI_2 - inner_trim, base + inner_trim)
                }
                // the gap is wider than the hole, the sector ends in the corner of the two gap edges
                false => {
                    let (sin_base, cos_base) = base.sin_cos();
                    let corner = Vector::new(
                        half_gap * (cos_base - sin_base),
                        half_gap * (sin_base + cos_base),
                    );
                    vec![center + corner]
                }
            };

            outer.into_iter().chain(inner).collect()
        })
        .collect()
}

fn arc(center: Position, radius: f64, from: f64, to: f64) -> Vec<Position> {
    (0..=THERMAL_ARC_STEPS)
        .map(|step| {
            let angle = from + (to - from) * step as f64 / THERMAL_ARC_STEPS as f64;
            Position::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// Vertices are rotated about the macro origin.
fn polygon(vertices: Vec<Position>, rotation: f64, exposure: Exposure) -> Shape {
    let vertices = vertices
        .into_iter()
        .map(|vertex| vertex.rotate_degrees(rotation))
        .collect();
    Shape::new(
        Geometry::Polygon {
            vertices,
        },
        exposure.is_negative(),
    )
}

/// Unrotated rectangles stay rectangles.
fn rectangle(origin: Position, width: f64, height: f64, rotation: f64, exposure: Exposure) -> Shape {
    if rotation % 360.0 == 0.0 {
        return Shape::new(
            Geometry::Rectangle {
                origin,
                width,
                height,
            },
            exposure.is_negative(),
        );
    }

    let corners = BoundingBox {
        min: origin,
        max: Position::new(origin.x + width, origin.y + height),
    }
    .vertices();
    polygon(corners, rotation, exposure)
}

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use log::trace;

use crate::rvmc::arc_points;
use crate::spacial::distance;
use crate::state::{ArcDirection, ArcInterpolation};
use crate::walker::DrawSegment;
use crate::{Position, ToVector, Vector};

/// Start and end points closer than this are treated as the same point.
const COINCIDENT_EPSILON: f64 = 1e-9;

/// A circular span with a resolved center, angles in radians, positive sweep is counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSpan {
    pub center: Position,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep_angle: f64,
}

impl ArcSpan {
    /// Sampled points, in absolute coordinates, from the start of the span to its end.
    pub fn points(&self) -> Vec<Position> {
        arc_points(self.radius, self.start_angle, self.sweep_angle)
            .into_iter()
            .map(|point| self.center + point.to_vector())
            .collect()
    }
}

/// Resolves the center and sweep of a circular D01.
///
/// A multi-quadrant arc whose start and end coincide is a full circle, returned as two half circles.
/// A single-quadrant arc whose start and end coincide has zero length and returns no spans.
pub fn resolve_arc(segment: &DrawSegment, direction: ArcDirection, interpolation: ArcInterpolation) -> Vec<ArcSpan> {
    let spans = match interpolation {
        ArcInterpolation::MultiQuadrant => resolve_multi_quadrant(segment, direction),
        ArcInterpolation::SingleQuadrant => resolve_single_quadrant(segment, direction)
            .into_iter()
            .collect(),
    };
    trace!("arc spans: {:?}", spans);
    spans
}

fn resolve_multi_quadrant(segment: &DrawSegment, direction: ArcDirection) -> Vec<ArcSpan> {
    let center = segment.start + segment.center_offset;
    let radius = distance(segment.start, center);
    let start_angle = angle_of(center, segment.start);

    if distance(segment.start, segment.end) < COINCIDENT_EPSILON {
        let half_turn = match direction {
            ArcDirection::Clockwise => -PI,
            ArcDirection::CounterClockwise => PI,
        };
        return vec![
            ArcSpan {
                center,
                radius,
                start_angle,
                sweep_angle: half_turn,
            },
            ArcSpan {
                center,
                radius,
                start_angle: start_angle + half_turn,
                sweep_angle: half_turn,
            },
        ];
    }

    vec![ArcSpan {
        center,
        radius,
        start_angle,
        sweep_angle: sweep(start_angle, angle_of(center, segment.end), direction),
    }]
}

/// I and J are unsigned in single-quadrant mode, the center is the candidate whose sweep stays within 90 degrees
/// and whose distance to the end point best matches the radius.
fn resolve_single_quadrant(segment: &DrawSegment, direction: ArcDirection) -> Option<ArcSpan> {
    if distance(segment.start, segment.end) < COINCIDENT_EPSILON {
        return None;
    }

    let offset = Vector::new(segment.center_offset.x.abs(), segment.center_offset.y.abs());

    let mut candidates: Vec<(bool, f64, ArcSpan)> = [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)]
        .iter()
        .map(|(sign_x, sign_y)| {
            let center = segment.start + Vector::new(offset.x * sign_x, offset.y * sign_y);
            let radius = distance(segment.start, center);
            let start_angle = angle_of(center, segment.start);
            let sweep_angle = sweep(start_angle, angle_of(center, segment.end), direction);
            let within_quadrant = sweep_angle.abs() <= FRAC_PI_2 + 1e-9;
            let radius_error = (distance(segment.end, center) - radius).abs();

            (within_quadrant, radius_error, ArcSpan {
                center,
                radius,
                start_angle,
                sweep_angle,
            })
        })
        .collect();

    // spans within the quadrant first, then by radius agreement
    candidates.sort_by(|(a_within, a_error, _), (b_within, b_error, _)| {
        b_within
            .cmp(a_within)
            .then(a_error.total_cmp(b_error))
    });

    candidates
        .first()
        .map(|(_, _, span)| *span)
}

fn angle_of(center: Position, point: Position) -> f64 {
    (point.y - center.y).atan2(point.x - center.x)
}

/// Clockwise sweeps are in `(-2π, 0)`, counter-clockwise sweeps in `(0, 2π)`.
fn sweep(start_angle: f64, end_angle: f64, direction: ArcDirection) -> f64 {
    let delta = end_angle - start_angle;
    match direction {
        ArcDirection::Clockwise => match delta >= 0.0 {
            true => delta - TAU,
            false => delta,
        },
        ArcDirection::CounterClockwise => match delta <= 0.0 {
            true => delta + TAU,
            false => delta,
        },
    }
}

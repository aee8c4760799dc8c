use crate::Position;

pub(crate) enum Winding {
    /// Aka 'Positive' in Geometry
    Clockwise,
    /// Aka 'Negative' in Geometry
    CounterClockwise,
}

/// Twice the signed area of a closed polygon (shoelace sum).
pub(crate) fn signed_area(vertices: &[Position]) -> f64 {
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        sum += vertices[i].x * vertices[j].y - vertices[j].x * vertices[i].y;
    }
    sum
}

impl Winding {
    pub(crate) fn from_vertices(vertices: &[Position]) -> Self {
        if signed_area(vertices) > 0.0 {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        }
    }
}

/// Macro primitive exposure, `0` cuts out, anything else adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    CutOut,
    Add,
}

impl Exposure {
    pub fn is_negative(&self) -> bool {
        matches!(self, Exposure::CutOut)
    }
}

impl From<bool> for Exposure {
    fn from(value: bool) -> Self {
        match value {
            true => Exposure::Add,
            false => Exposure::CutOut,
        }
    }
}

impl From<f64> for Exposure {
    fn from(value: f64) -> Self {
        (value.round() != 0.0).into()
    }
}

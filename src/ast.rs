//! Gerber command nodes, as produced by a front-end parser.
//!
//! Nodes are immutable, the walker and compiler only ever borrow them. Aperture blocks and step-and-repeat
//! constructs own their bodies, so a program is a tree rather than a flat list of open/close commands.

use std::fmt::{Display, Formatter};

use crate::coordinate::{CoordinateFormat, PackedCoordinate};
use crate::expressions::Expression;
use crate::state::{ArcInterpolation, Mirroring, PlotMode, Polarity, UnitMode};

/// Aperture identifier, e.g. `D10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApertureId(String);

impl ApertureId {
    pub fn new(code: u32) -> Self {
        Self(format!("D{}", code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ApertureId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for ApertureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Packed coordinate payload of a D01/D02/D03 operation, any axis may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinates {
    pub x: Option<PackedCoordinate>,
    pub y: Option<PackedCoordinate>,
    pub i: Option<PackedCoordinate>,
    pub j: Option<PackedCoordinate>,
}

impl Coordinates {
    pub fn new(x: Option<&str>, y: Option<&str>) -> Self {
        Self {
            x: x.map(PackedCoordinate::from),
            y: y.map(PackedCoordinate::from),
            i: None,
            j: None,
        }
    }

    pub fn xy(x: &str, y: &str) -> Self {
        Self::new(Some(x), Some(y))
    }

    pub fn with_offset(mut self, i: Option<&str>, j: Option<&str>) -> Self {
        self.i = i.map(PackedCoordinate::from);
        self.j = j.map(PackedCoordinate::from);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.i.is_none() && self.j.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Circle {
    pub diameter: f64,
    pub hole_diameter: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rectangular {
    pub x: f64,
    pub y: f64,
    pub hole_diameter: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    pub outer_diameter: f64,
    pub vertices: u32,
    /// degrees
    pub rotation: Option<f64>,
    pub hole_diameter: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApertureTemplate {
    Circle(Circle),
    Rectangle(Rectangular),
    Obround(Rectangular),
    Polygon(Polygon),
    /// An instance of an aperture macro, the parameters become `$1..$n`.
    Macro {
        name: String,
        parameters: Vec<f64>,
    },
    /// A template name the front-end recognised but which has no geometric interpretation.
    Unsupported {
        name: String,
    },
}

/// `%ADD10C,0.5*%`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApertureDefinition {
    pub id: ApertureId,
    pub template: ApertureTemplate,
}

/// `%ABD12*%` ... `%AB*%`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApertureBlock {
    pub id: ApertureId,
    pub nodes: Vec<Node>,
}

/// `%SRX3Y2I5.0J4.0*%` ... `%SR*%`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepRepeat {
    pub x_repeats: u32,
    pub y_repeats: u32,
    pub x_delta: f64,
    pub y_delta: f64,
    pub nodes: Vec<Node>,
}

/// `%AMname*...%`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroDefinition {
    pub name: String,
    pub body: Vec<MacroStatement>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MacroStatement {
    Comment(String),
    /// `$4=$1x2*`
    Assignment {
        variable: u32,
        expression: Expression,
    },
    Primitive(MacroPrimitive),
}

/// Macro primitives, rotations are in degrees about the macro origin.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MacroPrimitive {
    Circle {
        exposure: Expression,
        diameter: Expression,
        center_x: Expression,
        center_y: Expression,
        rotation: Option<Expression>,
    },
    VectorLine {
        exposure: Expression,
        width: Expression,
        start_x: Expression,
        start_y: Expression,
        end_x: Expression,
        end_y: Expression,
        rotation: Expression,
    },
    CenterLine {
        exposure: Expression,
        width: Expression,
        height: Expression,
        center_x: Expression,
        center_y: Expression,
        rotation: Expression,
    },
    LowerLeftLine {
        exposure: Expression,
        width: Expression,
        height: Expression,
        x: Expression,
        y: Expression,
        rotation: Expression,
    },
    Outline {
        exposure: Expression,
        /// The first point is repeated as the last point.
        points: Vec<(Expression, Expression)>,
        rotation: Expression,
    },
    Polygon {
        exposure: Expression,
        vertices: Expression,
        center_x: Expression,
        center_y: Expression,
        diameter: Expression,
        rotation: Expression,
    },
    Moire {
        center_x: Expression,
        center_y: Expression,
        outer_diameter: Expression,
        ring_thickness: Expression,
        gap: Expression,
        max_rings: Expression,
        crosshair_thickness: Expression,
        crosshair_length: Expression,
        rotation: Expression,
    },
    Thermal {
        center_x: Expression,
        center_y: Expression,
        outer_diameter: Expression,
        inner_diameter: Expression,
        gap: Expression,
        rotation: Expression,
    },
}

impl MacroPrimitive {
    /// The primitive code used in the macro body, vector lines are written as `20` (`2` is a deprecated alias).
    pub fn code(&self) -> u8 {
        match self {
            MacroPrimitive::Circle {
                ..
            } => 1,
            MacroPrimitive::VectorLine {
                ..
            } => 20,
            MacroPrimitive::CenterLine {
                ..
            } => 21,
            MacroPrimitive::LowerLeftLine {
                ..
            } => 22,
            MacroPrimitive::Outline {
                ..
            } => 4,
            MacroPrimitive::Polygon {
                ..
            } => 5,
            MacroPrimitive::Moire {
                ..
            } => 6,
            MacroPrimitive::Thermal {
                ..
            } => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    FormatSpecification(CoordinateFormat),
    UnitMode(UnitMode),
    /// G70 (inch) / G71 (mm)
    LegacyUnit(UnitMode),
    ApertureDefinition(ApertureDefinition),
    ApertureBlock(ApertureBlock),
    MacroDefinition(MacroDefinition),
    StepRepeat(StepRepeat),
    SelectAperture(ApertureId),
    /// D01
    Draw(Coordinates),
    /// D02
    Move(Coordinates),
    /// D03
    Flash(Coordinates),
    PlotMode(PlotMode),
    ArcInterpolation(ArcInterpolation),
    BeginRegion,
    EndRegion,
    LoadPolarity(Polarity),
    LoadMirroring(Mirroring),
    /// degrees, counter-clockwise
    LoadRotation(f64),
    LoadScale(f64),
    ApertureAttribute(Attribute),
    FileAttribute(Attribute),
    ObjectAttribute(Attribute),
    /// `None` deletes all aperture and object attributes
    DeleteAttribute(Option<String>),
    Comment(String),
    /// M00
    ProgramStop,
    /// M01
    OptionalStop,
    /// M02
    EndOfFile,
}

impl Node {
    /// The Gerber command word, for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Node::FormatSpecification(_) => "FS",
            Node::UnitMode(_) => "MO",
            Node::LegacyUnit(UnitMode::Imperial) => "G70",
            Node::LegacyUnit(UnitMode::Metric) => "G71",
            Node::ApertureDefinition(_) => "AD",
            Node::ApertureBlock(_) => "AB",
            Node::MacroDefinition(_) => "AM",
            Node::StepRepeat(_) => "SR",
            Node::SelectAperture(_) => "Dnn",
            Node::Draw(_) => "D01",
            Node::Move(_) => "D02",
            Node::Flash(_) => "D03",
            Node::PlotMode(PlotMode::Linear) => "G01",
            Node::PlotMode(PlotMode::ClockwiseArc) => "G02",
            Node::PlotMode(PlotMode::CounterClockwiseArc) => "G03",
            Node::ArcInterpolation(ArcInterpolation::SingleQuadrant) => "G74",
            Node::ArcInterpolation(ArcInterpolation::MultiQuadrant) => "G75",
            Node::BeginRegion => "G36",
            Node::EndRegion => "G37",
            Node::LoadPolarity(_) => "LP",
            Node::LoadMirroring(_) => "LM",
            Node::LoadRotation(_) => "LR",
            Node::LoadScale(_) => "LS",
            Node::ApertureAttribute(_) => "TA",
            Node::FileAttribute(_) => "TF",
            Node::ObjectAttribute(_) => "TO",
            Node::DeleteAttribute(_) => "TD",
            Node::Comment(_) => "G04",
            Node::ProgramStop => "M00",
            Node::OptionalStop => "M01",
            Node::EndOfFile => "M02",
        }
    }
}

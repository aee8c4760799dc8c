use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use log::{debug, trace};

use crate::ast::{
    ApertureBlock, ApertureDefinition, ApertureId, ApertureTemplate, Attribute, Coordinates, MacroDefinition,
};
use crate::coordinate::{Axis, CoordinateFormat, CoordinateNotation, PackedCoordinate};
use crate::error::CompileError;
use crate::{Position, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitMode {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlotMode {
    #[default]
    Linear,
    ClockwiseArc,
    CounterClockwiseArc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArcInterpolation {
    SingleQuadrant,
    #[default]
    MultiQuadrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    #[default]
    Dark,
    Clear,
}

impl Polarity {
    pub fn is_negative(&self) -> bool {
        matches!(self, Polarity::Clear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mirroring {
    #[default]
    None,
    /// x -> -x
    X,
    /// y -> -y
    Y,
    XY,
}

impl Mirroring {
    pub fn mirrors_x(&self) -> bool {
        matches!(self, Mirroring::X | Mirroring::XY)
    }

    pub fn mirrors_y(&self) -> bool {
        matches!(self, Mirroring::Y | Mirroring::XY)
    }
}

impl Display for Mirroring {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mirroring::None => "N",
            Mirroring::X => "X",
            Mirroring::Y => "Y",
            Mirroring::XY => "XY",
        })
    }
}

/// Object transformation set by the LP, LM, LR and LS commands.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectTransform {
    pub polarity: Polarity,
    pub mirroring: Mirroring,
    /// degrees, counter-clockwise
    pub rotation: f64,
    pub scale: f64,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            polarity: Polarity::Dark,
            mirroring: Mirroring::None,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

impl ObjectTransform {
    /// Polarity is applied when pasting and does not take part in the tag.
    pub fn tag(&self) -> TransformTag {
        TransformTag(format!("M{},R{},S{}", self.mirroring, self.rotation, self.scale))
    }

    /// True when the geometry is unchanged, regardless of polarity.
    pub fn is_geometric_identity(&self) -> bool {
        self.mirroring == Mirroring::None && self.rotation % 360.0 == 0.0 && self.scale == 1.0
    }
}

/// Cache key for geometry pre-transformed by mirroring, rotation and scale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformTag(String);

impl Display for TransformTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unpacked coordinates of the node being visited, `None` where the node omitted the axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PendingCoordinate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub i: Option<f64>,
    pub j: Option<f64>,
}

pub type AttributeDictionary = BTreeMap<String, Attribute>;

#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub aperture: AttributeDictionary,
    pub file: AttributeDictionary,
    pub object: AttributeDictionary,
}

/// An aperture id resolved against the defined apertures and aperture blocks.
#[derive(Debug, Clone, Copy)]
pub enum ApertureRef<'a> {
    Standard(&'a ApertureDefinition),
    Block(&'a ApertureBlock),
}

impl ApertureRef<'_> {
    pub fn id(&self) -> &ApertureId {
        match self {
            ApertureRef::Standard(definition) => &definition.id,
            ApertureRef::Block(block) => &block.id,
        }
    }
}

/// Cumulative graphics state. Definitions are borrowed from the nodes being walked.
#[derive(Debug, Default)]
pub struct DrawingState<'a> {
    pub unit_mode: UnitMode,
    coordinate_format: Option<CoordinateFormat>,
    coordinates_unpacked: bool,
    pub plot_mode: PlotMode,
    pub arc_interpolation: ArcInterpolation,
    pub current_position: Position,
    pub pending: PendingCoordinate,
    pub current_aperture_id: Option<ApertureId>,
    pub transform: ObjectTransform,
    apertures: HashMap<ApertureId, &'a ApertureDefinition>,
    blocks: HashMap<ApertureId, &'a ApertureBlock>,
    macros: HashMap<String, &'a MacroDefinition>,
    pub attributes: Attributes,
    aperture_attribute_snapshots: HashMap<ApertureId, AttributeDictionary>,
    pub is_region: bool,
}

impl<'a> DrawingState<'a> {
    pub fn coordinate_format(&self) -> Option<&CoordinateFormat> {
        self.coordinate_format.as_ref()
    }

    /// Once coordinates have been unpacked the format may only be re-stated, not changed.
    pub fn set_coordinate_format(&mut self, format: CoordinateFormat) -> Result<(), CompileError> {
        if self.coordinates_unpacked && self.coordinate_format != Some(format) {
            return Err(CompileError::CoordinateFormatRedefined);
        }
        debug!("coordinate format: {}", format);
        self.coordinate_format = Some(format);
        Ok(())
    }

    /// Unpacks the coordinates of a D01/D02/D03 node into `pending`.
    ///
    /// A node without coordinates does not need a coordinate format.
    pub fn load_coordinates(&mut self, coordinates: &Coordinates) -> Result<(), CompileError> {
        self.pending = PendingCoordinate::default();
        if coordinates.is_empty() {
            return Ok(());
        }

        let format = self
            .coordinate_format
            .ok_or(CompileError::CoordinateFormatNotSet)?;

        let unpack = |axis: Axis, raw: &Option<PackedCoordinate>| -> Result<Option<f64>, CompileError> {
            raw.as_ref()
                .map(|raw| format.unpack(axis, raw))
                .transpose()
                .map_err(CompileError::from)
        };

        let pending = PendingCoordinate {
            x: unpack(Axis::X, &coordinates.x)?,
            y: unpack(Axis::Y, &coordinates.y)?,
            i: unpack(Axis::I, &coordinates.i)?,
            j: unpack(Axis::J, &coordinates.j)?,
        };
        trace!("pending coordinate: {:?}", pending);

        self.coordinates_unpacked = true;
        self.pending = pending;
        Ok(())
    }

    /// The point the pending coordinates move to. Omitted axes keep the current value.
    pub fn target_position(&self) -> Position {
        let PendingCoordinate {
            x,
            y,
            ..
        } = self.pending;
        let current = self.current_position;

        match self
            .coordinate_format
            .map(|format| format.notation)
        {
            Some(CoordinateNotation::Incremental) => {
                Position::new(current.x + x.unwrap_or(0.0), current.y + y.unwrap_or(0.0))
            }
            _ => Position::new(x.unwrap_or(current.x), y.unwrap_or(current.y)),
        }
    }

    /// Arc center offset, omitted offsets are zero.
    pub fn arc_offset(&self) -> Vector {
        Vector::new(self.pending.i.unwrap_or(0.0), self.pending.j.unwrap_or(0.0))
    }

    pub fn commit_position(&mut self) {
        self.current_position = self.target_position();
        self.pending = PendingCoordinate::default();
    }

    /// Registers an aperture and snapshots the aperture attributes currently in effect.
    pub fn define_aperture(&mut self, definition: &'a ApertureDefinition) -> Result<(), CompileError> {
        if let ApertureTemplate::Macro {
            name, ..
        } = &definition.template
        {
            if !self.macros.contains_key(name) {
                return Err(CompileError::MacroNotDefined(name.clone()));
            }
        }

        self.blocks.remove(&definition.id);
        self.apertures
            .insert(definition.id.clone(), definition);
        self.aperture_attribute_snapshots
            .insert(definition.id.clone(), self.attributes.aperture.clone());
        Ok(())
    }

    pub fn define_block(&mut self, block: &'a ApertureBlock) {
        self.apertures.remove(&block.id);
        self.blocks.insert(block.id.clone(), block);
        self.aperture_attribute_snapshots
            .insert(block.id.clone(), self.attributes.aperture.clone());
    }

    pub fn define_macro(&mut self, definition: &'a MacroDefinition) {
        self.macros
            .insert(definition.name.clone(), definition);
    }

    pub fn macro_definition(&self, name: &str) -> Option<&'a MacroDefinition> {
        self.macros.get(name).copied()
    }

    pub fn resolve_aperture(&self, id: &ApertureId) -> Result<ApertureRef<'a>, CompileError> {
        if let Some(definition) = self.apertures.get(id).copied() {
            return Ok(ApertureRef::Standard(definition));
        }
        self.blocks
            .get(id)
            .copied()
            .map(ApertureRef::Block)
            .ok_or_else(|| CompileError::ApertureNotFound(id.clone()))
    }

    pub fn current_aperture(&self) -> Result<ApertureRef<'a>, CompileError> {
        let id = self
            .current_aperture_id
            .as_ref()
            .ok_or(CompileError::ApertureNotSelected)?;
        self.resolve_aperture(id)
    }

    pub fn set_attribute(&mut self, dictionary: AttributeKind, attribute: &Attribute) {
        let dictionary = match dictionary {
            AttributeKind::Aperture => &mut self.attributes.aperture,
            AttributeKind::File => &mut self.attributes.file,
            AttributeKind::Object => &mut self.attributes.object,
        };
        dictionary.insert(attribute.name.clone(), attribute.clone());
    }

    /// `None` clears the aperture and object attributes, file attributes are only removed by name.
    pub fn delete_attribute(&mut self, name: Option<&str>) {
        match name {
            None => {
                self.attributes.aperture.clear();
                self.attributes.object.clear();
            }
            Some(name) => {
                self.attributes.aperture.remove(name);
                self.attributes.object.remove(name);
                self.attributes.file.remove(name);
            }
        }
    }

    /// Aperture attributes as they were when the aperture was defined.
    pub fn aperture_attributes_of(&self, id: &ApertureId) -> Option<&AttributeDictionary> {
        self.aperture_attribute_snapshots.get(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Aperture,
    File,
    Object,
}

#[cfg(test)]
mod state_tests {
    use rstest::rstest;

    use super::*;
    use crate::ast::{Circle, Coordinates};
    use crate::coordinate::{AxisFormat, ZeroSuppression};

    fn circle_aperture(code: u32) -> ApertureDefinition {
        ApertureDefinition {
            id: ApertureId::new(code),
            template: ApertureTemplate::Circle(Circle {
                diameter: 1.0,
                hole_diameter: None,
            }),
        }
    }

    #[test]
    fn test_coordinates_require_format() {
        // given
        let mut state = DrawingState::default();

        // then
        assert_eq!(
            state.load_coordinates(&Coordinates::xy("1", "2")),
            Err(CompileError::CoordinateFormatNotSet)
        );
        assert_eq!(state.load_coordinates(&Coordinates::default()), Ok(()));
    }

    #[test]
    fn test_missing_axis_keeps_current_value() {
        // given
        let mut state = DrawingState::default();
        state
            .set_coordinate_format(CoordinateFormat::absolute(ZeroSuppression::SkipLeading, 2, 4))
            .unwrap();
        state.current_position = Position::new(5.0, 5.0);

        // when
        state
            .load_coordinates(&Coordinates::new(None, Some("100000")))
            .unwrap();

        // then
        assert_eq!(state.target_position(), Position::new(5.0, 10.0));
        assert_eq!(state.arc_offset(), Vector::new(0.0, 0.0));

        // and
        state.commit_position();
        assert_eq!(state.current_position, Position::new(5.0, 10.0));
        assert_eq!(state.pending, PendingCoordinate::default());
    }

    #[test]
    fn test_incremental_notation() {
        // given
        let mut state = DrawingState::default();
        let axis = AxisFormat::new(2, 3);
        state
            .set_coordinate_format(CoordinateFormat::new(
                ZeroSuppression::SkipLeading,
                CoordinateNotation::Incremental,
                axis,
                axis,
            ))
            .unwrap();
        state.current_position = Position::new(1.0, 1.0);

        // when
        state
            .load_coordinates(&Coordinates::new(Some("-500"), None))
            .unwrap();

        // then
        assert_eq!(state.target_position(), Position::new(0.5, 1.0));
    }

    #[test]
    fn test_format_cannot_change_after_use() {
        // given
        let mut state = DrawingState::default();
        let format = CoordinateFormat::absolute(ZeroSuppression::SkipLeading, 2, 4);
        state.set_coordinate_format(format).unwrap();
        state
            .load_coordinates(&Coordinates::xy("1", "1"))
            .unwrap();

        // then
        assert_eq!(state.set_coordinate_format(format), Ok(()));
        assert_eq!(
            state.set_coordinate_format(CoordinateFormat::absolute(ZeroSuppression::SkipLeading, 3, 5)),
            Err(CompileError::CoordinateFormatRedefined)
        );
    }

    #[test]
    fn test_aperture_resolution() {
        // given
        let definition = circle_aperture(10);
        let block = ApertureBlock {
            id: ApertureId::new(11),
            nodes: vec![],
        };
        let mut state = DrawingState::default();

        // when
        state.define_aperture(&definition).unwrap();
        state.define_block(&block);

        // then
        assert!(matches!(state.current_aperture(), Err(CompileError::ApertureNotSelected)));

        state.current_aperture_id = Some(ApertureId::new(10));
        assert!(matches!(state.current_aperture(), Ok(ApertureRef::Standard(_))));

        state.current_aperture_id = Some(ApertureId::new(11));
        assert!(matches!(state.current_aperture(), Ok(ApertureRef::Block(_))));

        state.current_aperture_id = Some(ApertureId::new(12));
        assert_eq!(
            state.current_aperture().map(|aperture| aperture.id().clone()),
            Err(CompileError::ApertureNotFound(ApertureId::new(12)))
        );
    }

    #[test]
    fn test_macro_aperture_requires_macro() {
        // given
        let definition = ApertureDefinition {
            id: ApertureId::new(20),
            template: ApertureTemplate::Macro {
                name: "THERMAL".to_string(),
                parameters: vec![1.0],
            },
        };
        let macro_definition = MacroDefinition {
            name: "THERMAL".to_string(),
            body: vec![],
        };
        let mut state = DrawingState::default();

        // then
        assert_eq!(
            state.define_aperture(&definition),
            Err(CompileError::MacroNotDefined("THERMAL".to_string()))
        );

        // when
        state.define_macro(&macro_definition);

        // then
        assert_eq!(state.define_aperture(&definition), Ok(()));
    }

    #[test]
    fn test_attribute_snapshots_survive_deletion() {
        // given
        let definition = circle_aperture(10);
        let mut state = DrawingState::default();
        state.set_attribute(AttributeKind::Aperture, &Attribute::new(".AperFunction", &["ViaPad"]));
        state.set_attribute(AttributeKind::Object, &Attribute::new(".N", &["GND"]));
        state.set_attribute(AttributeKind::File, &Attribute::new(".Part", &["Single"]));

        // when
        state.define_aperture(&definition).unwrap();
        state.delete_attribute(None);

        // then
        assert!(state.attributes.aperture.is_empty());
        assert!(state.attributes.object.is_empty());
        assert_eq!(state.attributes.file.len(), 1);

        let snapshot = state
            .aperture_attributes_of(&ApertureId::new(10))
            .unwrap();
        assert_eq!(snapshot[".AperFunction"].values, vec!["ViaPad".to_string()]);
    }

    #[test]
    fn test_delete_named_attribute() {
        let mut state = DrawingState::default();
        state.set_attribute(AttributeKind::Object, &Attribute::new(".N", &["GND"]));
        state.set_attribute(AttributeKind::Object, &Attribute::new(".P", &["U1", "1"]));

        state.delete_attribute(Some(".N"));

        assert_eq!(state.attributes.object.keys().collect::<Vec<_>>(), vec![".P"]);
    }

    #[rstest]
    #[case(ObjectTransform::default(), true)]
    #[case(ObjectTransform { polarity: Polarity::Clear, ..ObjectTransform::default() }, true)]
    #[case(ObjectTransform { rotation: 360.0, ..ObjectTransform::default() }, true)]
    #[case(ObjectTransform { rotation: 90.0, ..ObjectTransform::default() }, false)]
    #[case(ObjectTransform { mirroring: Mirroring::Y, ..ObjectTransform::default() }, false)]
    #[case(ObjectTransform { scale: 2.0, ..ObjectTransform::default() }, false)]
    fn test_geometric_identity(#[case] transform: ObjectTransform, #[case] expected: bool) {
        assert_eq!(transform.is_geometric_identity(), expected);
    }

    #[test]
    fn test_tag_ignores_polarity() {
        let dark = ObjectTransform {
            rotation: 45.0,
            ..ObjectTransform::default()
        };
        let clear = ObjectTransform {
            polarity: Polarity::Clear,
            ..dark
        };

        assert_eq!(dark.tag(), clear.tag());
        assert_eq!(dark.tag().to_string(), "MN,R45,S1");
        assert_ne!(dark.tag(), ObjectTransform::default().tag());
    }
}

//! Walks command nodes, keeping [`DrawingState`] up to date and calling [`WalkerHooks`] for anything which
//! produces geometry.

use log::{debug, trace, warn};

use crate::ast::{
    ApertureBlock, ApertureDefinition, ApertureId, ApertureTemplate, Circle, Node, Polygon, Rectangular, StepRepeat,
};
use crate::error::CompileError;
use crate::state::{ApertureRef, ArcDirection, ArcInterpolation, AttributeKind, DrawingState, PlotMode};
use crate::{Position, Vector};

/// Outcome of visiting a node, `Halt` stops the traversal without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorHandling {
    /// Abort the pass with the first error.
    #[default]
    Raise,
    /// Skip the failing node silently.
    Ignore,
    /// Skip the failing node, log it and record a [`Diagnostic`].
    Warn,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WalkerOptions {
    /// When set, M01 (optional stop) does not halt the traversal.
    pub ignore_program_stop: bool,
    pub error_handling: ErrorHandling,
}

/// A node which was skipped because of an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub node: &'static str,
    pub error: CompileError,
}

/// The segment of a D01 operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawSegment {
    pub start: Position,
    pub end: Position,
    /// I/J offset
    pub center_offset: Vector,
}

/// The geometric interpretation of the selected aperture, derived when the aperture is selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlashTarget<'a> {
    Circle(&'a Circle),
    Rectangle(&'a Rectangular),
    Obround(&'a Rectangular),
    Polygon(&'a Polygon),
    Macro {
        name: &'a str,
        parameters: &'a [f64],
    },
    Block(&'a ApertureBlock),
}

impl<'a> FlashTarget<'a> {
    fn from_definition(definition: &'a ApertureDefinition) -> Result<Self, CompileError> {
        match &definition.template {
            ApertureTemplate::Circle(circle) => Ok(FlashTarget::Circle(circle)),
            ApertureTemplate::Rectangle(rectangle) => Ok(FlashTarget::Rectangle(rectangle)),
            ApertureTemplate::Obround(obround) => Ok(FlashTarget::Obround(obround)),
            ApertureTemplate::Polygon(polygon) => Ok(FlashTarget::Polygon(polygon)),
            ApertureTemplate::Macro {
                name,
                parameters,
            } => Ok(FlashTarget::Macro {
                name,
                parameters,
            }),
            ApertureTemplate::Unsupported {
                ..
            } => Err(CompileError::DirectApertureDispatchNotSupported(definition.id.clone())),
        }
    }
}

/// Callbacks made by the [`AstWalker`]. The state passed in has already been updated for the node, except
/// for the current position which moves after the callback succeeds.
#[allow(unused_variables)]
pub trait WalkerHooks<'a> {
    fn on_aperture_defined(
        &mut self,
        state: &DrawingState<'a>,
        definition: &'a ApertureDefinition,
    ) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_begin_block(&mut self, state: &DrawingState<'a>, block: &'a ApertureBlock) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_end_block(&mut self, state: &DrawingState<'a>, block: &'a ApertureBlock) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_begin_step_repeat(
        &mut self,
        state: &DrawingState<'a>,
        step_repeat: &'a StepRepeat,
    ) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_end_step_repeat(
        &mut self,
        state: &DrawingState<'a>,
        step_repeat: &'a StepRepeat,
    ) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_flash(
        &mut self,
        state: &DrawingState<'a>,
        aperture: &ApertureId,
        target: &FlashTarget<'a>,
        position: Position,
    ) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_draw_line(&mut self, state: &DrawingState<'a>, segment: &DrawSegment) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_draw_arc(
        &mut self,
        state: &DrawingState<'a>,
        segment: &DrawSegment,
        direction: ArcDirection,
        interpolation: ArcInterpolation,
    ) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_begin_region(&mut self, state: &DrawingState<'a>) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_region_line(&mut self, state: &DrawingState<'a>, segment: &DrawSegment) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_region_arc(
        &mut self,
        state: &DrawingState<'a>,
        segment: &DrawSegment,
        direction: ArcDirection,
        interpolation: ArcInterpolation,
    ) -> Result<(), CompileError> {
        Ok(())
    }

    /// Called for a D02 inside a region, before the position moves.
    fn on_flush_region(&mut self, state: &DrawingState<'a>) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_end_region(&mut self, state: &DrawingState<'a>) -> Result<(), CompileError> {
        Ok(())
    }

    /// Always called once when the walk ends, however it ends.
    fn on_end_of_file(&mut self, state: &DrawingState<'a>) -> Result<(), CompileError> {
        Ok(())
    }
}

type DrawHandler<'a, H> = fn(&mut H, &DrawingState<'a>, &DrawSegment) -> Result<(), CompileError>;

fn draw_line<'a, H: WalkerHooks<'a>>(
    hooks: &mut H,
    state: &DrawingState<'a>,
    segment: &DrawSegment,
) -> Result<(), CompileError> {
    hooks.on_draw_line(state, segment)
}

fn draw_arc<'a, H: WalkerHooks<'a>, const CLOCKWISE: bool, const SINGLE_QUADRANT: bool>(
    hooks: &mut H,
    state: &DrawingState<'a>,
    segment: &DrawSegment,
) -> Result<(), CompileError> {
    let (direction, interpolation) = arc_mode(CLOCKWISE, SINGLE_QUADRANT);
    hooks.on_draw_arc(state, segment, direction, interpolation)
}

fn region_line<'a, H: WalkerHooks<'a>>(
    hooks: &mut H,
    state: &DrawingState<'a>,
    segment: &DrawSegment,
) -> Result<(), CompileError> {
    hooks.on_region_line(state, segment)
}

fn region_arc<'a, H: WalkerHooks<'a>, const CLOCKWISE: bool, const SINGLE_QUADRANT: bool>(
    hooks: &mut H,
    state: &DrawingState<'a>,
    segment: &DrawSegment,
) -> Result<(), CompileError> {
    let (direction, interpolation) = arc_mode(CLOCKWISE, SINGLE_QUADRANT);
    hooks.on_region_arc(state, segment, direction, interpolation)
}

fn arc_mode(clockwise: bool, single_quadrant: bool) -> (ArcDirection, ArcInterpolation) {
    (
        match clockwise {
            true => ArcDirection::Clockwise,
            false => ArcDirection::CounterClockwise,
        },
        match single_quadrant {
            true => ArcInterpolation::SingleQuadrant,
            false => ArcInterpolation::MultiQuadrant,
        },
    )
}

/// Index into the draw dispatch table, `region * 6 + plot mode * 2 + interpolation`.
fn dispatch_index(plot_mode: PlotMode, interpolation: ArcInterpolation, is_region: bool) -> usize {
    let plot_mode = match plot_mode {
        PlotMode::Linear => 0,
        PlotMode::ClockwiseArc => 1,
        PlotMode::CounterClockwiseArc => 2,
    };
    let interpolation = match interpolation {
        ArcInterpolation::SingleQuadrant => 0,
        ArcInterpolation::MultiQuadrant => 1,
    };
    usize::from(is_region) * 6 + plot_mode * 2 + interpolation
}

pub struct AstWalker<'a, H: WalkerHooks<'a>> {
    state: DrawingState<'a>,
    hooks: H,
    options: WalkerOptions,
    draw_table: [DrawHandler<'a, H>; 12],
    draw_handler: DrawHandler<'a, H>,
    flash_target: Option<FlashTarget<'a>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, H: WalkerHooks<'a>> AstWalker<'a, H> {
    pub fn new(hooks: H, options: WalkerOptions) -> Self {
        let draw_table: [DrawHandler<'a, H>; 12] = [
            draw_line::<H>,
            draw_line::<H>,
            draw_arc::<H, true, true>,
            draw_arc::<H, true, false>,
            draw_arc::<H, false, true>,
            draw_arc::<H, false, false>,
            region_line::<H>,
            region_line::<H>,
            region_arc::<H, true, true>,
            region_arc::<H, true, false>,
            region_arc::<H, false, true>,
            region_arc::<H, false, false>,
        ];
        let state = DrawingState::default();
        let draw_handler = draw_table[dispatch_index(state.plot_mode, state.arc_interpolation, state.is_region)];

        Self {
            state,
            hooks,
            options,
            draw_table,
            draw_handler,
            flash_target: None,
            diagnostics: vec![],
        }
    }

    pub fn state(&self) -> &DrawingState<'a> {
        &self.state
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (H, Vec<Diagnostic>) {
        (self.hooks, self.diagnostics)
    }

    /// Walks all the nodes, a program stop or end of file ends the walk successfully.
    #[profiling::function]
    pub fn walk(&mut self, nodes: &'a [Node]) -> Result<(), CompileError> {
        let result = self.walk_nodes(nodes);
        if let Ok(Flow::Halt) = result {
            debug!("traversal halted");
        }
        let finalized = self.hooks.on_end_of_file(&self.state);

        result.and(finalized)
    }

    fn walk_nodes(&mut self, nodes: &'a [Node]) -> Result<Flow, CompileError> {
        for node in nodes {
            trace!("node: {}", node.code());
            match self.visit(node) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => return Ok(Flow::Halt),
                Err(error) => self.handle_error(node, error)?,
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_error(&mut self, node: &Node, error: CompileError) -> Result<(), CompileError> {
        if error.is_always_fatal() {
            return Err(error);
        }
        match self.options.error_handling {
            ErrorHandling::Raise => Err(error),
            ErrorHandling::Ignore => {
                trace!("ignoring error. node: {}, error: {}", node.code(), error);
                Ok(())
            }
            ErrorHandling::Warn => {
                warn!("skipping node. node: {}, error: {}", node.code(), error);
                self.diagnostics.push(Diagnostic {
                    node: node.code(),
                    error,
                });
                Ok(())
            }
        }
    }

    fn redispatch(&mut self) {
        let index = dispatch_index(self.state.plot_mode, self.state.arc_interpolation, self.state.is_region);
        trace!("draw handler: {}", index);
        self.draw_handler = self.draw_table[index];
    }

    fn select_aperture(&mut self, id: &ApertureId) -> Result<(), CompileError> {
        self.state.current_aperture_id = Some(id.clone());
        self.flash_target = None;

        match self.state.resolve_aperture(id) {
            Ok(ApertureRef::Standard(definition)) => {
                self.flash_target = Some(FlashTarget::from_definition(definition)?);
            }
            Ok(ApertureRef::Block(block)) => {
                self.flash_target = Some(FlashTarget::Block(block));
            }
            Err(_) => {
                debug!("selected aperture {} is not defined (yet)", id);
            }
        }
        Ok(())
    }

    /// A redefinition of the selected aperture changes what a flash produces.
    fn reselect_if_current(&mut self, id: &ApertureId) -> Result<(), CompileError> {
        match self.state.current_aperture_id.clone() {
            Some(current) if current == *id => self.select_aperture(&current),
            _ => Ok(()),
        }
    }

    fn visit(&mut self, node: &'a Node) -> Result<Flow, CompileError> {
        match node {
            Node::FormatSpecification(format) => self.state.set_coordinate_format(*format)?,
            Node::UnitMode(unit_mode) | Node::LegacyUnit(unit_mode) => self.state.unit_mode = *unit_mode,
            Node::ApertureDefinition(definition) => {
                self.state.define_aperture(definition)?;
                self.hooks
                    .on_aperture_defined(&self.state, definition)?;
                self.reselect_if_current(&definition.id)?;
            }
            Node::ApertureBlock(block) => return self.visit_block(block),
            Node::MacroDefinition(definition) => self.state.define_macro(definition),
            Node::StepRepeat(step_repeat) => return self.visit_step_repeat(step_repeat),
            Node::SelectAperture(id) => self.select_aperture(id)?,
            Node::Draw(coordinates) => {
                self.state.load_coordinates(coordinates)?;
                if !self.state.is_region {
                    self.state.current_aperture()?;
                }
                let segment = DrawSegment {
                    start: self.state.current_position,
                    end: self.state.target_position(),
                    center_offset: self.state.arc_offset(),
                };
                (self.draw_handler)(&mut self.hooks, &self.state, &segment)?;
                self.state.commit_position();
            }
            Node::Move(coordinates) => {
                self.state.load_coordinates(coordinates)?;
                if self.state.is_region {
                    self.hooks.on_flush_region(&self.state)?;
                }
                self.state.commit_position();
            }
            Node::Flash(coordinates) => {
                self.state.load_coordinates(coordinates)?;
                if self.state.is_region {
                    warn!("flash inside a region, ignoring");
                    return Ok(Flow::Continue);
                }
                let aperture = self.state.current_aperture()?;
                let target = self
                    .flash_target
                    .ok_or_else(|| CompileError::ApertureNotFound(aperture.id().clone()))?;
                let position = self.state.target_position();
                self.hooks
                    .on_flash(&self.state, aperture.id(), &target, position)?;
                self.state.commit_position();
            }
            Node::PlotMode(plot_mode) => {
                self.state.plot_mode = *plot_mode;
                self.redispatch();
            }
            Node::ArcInterpolation(interpolation) => {
                self.state.arc_interpolation = *interpolation;
                self.redispatch();
            }
            Node::BeginRegion => {
                self.state.is_region = true;
                self.redispatch();
                self.hooks.on_begin_region(&self.state)?;
            }
            Node::EndRegion => {
                let result = self.hooks.on_end_region(&self.state);
                self.state.is_region = false;
                self.redispatch();
                result?;
            }
            Node::LoadPolarity(polarity) => self.state.transform.polarity = *polarity,
            Node::LoadMirroring(mirroring) => self.state.transform.mirroring = *mirroring,
            Node::LoadRotation(rotation) => self.state.transform.rotation = *rotation,
            Node::LoadScale(scale) => self.state.transform.scale = *scale,
            Node::ApertureAttribute(attribute) => self
                .state
                .set_attribute(AttributeKind::Aperture, attribute),
            Node::FileAttribute(attribute) => self
                .state
                .set_attribute(AttributeKind::File, attribute),
            Node::ObjectAttribute(attribute) => self
                .state
                .set_attribute(AttributeKind::Object, attribute),
            Node::DeleteAttribute(name) => self.state.delete_attribute(name.as_deref()),
            Node::Comment(comment) => trace!("comment: {}", comment),
            Node::ProgramStop | Node::EndOfFile => return Ok(Flow::Halt),
            Node::OptionalStop => {
                if !self.options.ignore_program_stop {
                    return Ok(Flow::Halt);
                }
                debug!("ignoring optional stop");
            }
        }
        Ok(Flow::Continue)
    }

    /// The block is registered before its body is walked, the current point is restored afterwards.
    fn visit_block(&mut self, block: &'a ApertureBlock) -> Result<Flow, CompileError> {
        self.state.define_block(block);
        self.reselect_if_current(&block.id)?;
        self.hooks.on_begin_block(&self.state, block)?;

        let saved_position = self.state.current_position;
        let flow = self.walk_nodes(&block.nodes);
        self.state.current_position = saved_position;

        let ended = self.hooks.on_end_block(&self.state, block);
        let flow = flow?;
        ended?;
        Ok(flow)
    }

    fn visit_step_repeat(&mut self, step_repeat: &'a StepRepeat) -> Result<Flow, CompileError> {
        self.hooks
            .on_begin_step_repeat(&self.state, step_repeat)?;

        let saved_position = self.state.current_position;
        let flow = self.walk_nodes(&step_repeat.nodes);
        self.state.current_position = saved_position;

        let ended = self
            .hooks
            .on_end_step_repeat(&self.state, step_repeat);
        let flow = flow?;
        ended?;
        Ok(flow)
    }
}

#[cfg(test)]
mod walker_tests {
    use rstest::rstest;

    use super::*;
    use crate::ast::Coordinates;
    use crate::state::UnitMode;
    use crate::testing::{circle_aperture, format_2_4, init_logging, packed, unsupported_aperture};

    /// Records hook calls as strings.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_on_flash: bool,
    }

    impl<'a> WalkerHooks<'a> for Recorder {
        fn on_aperture_defined(
            &mut self,
            _state: &DrawingState<'a>,
            definition: &'a ApertureDefinition,
        ) -> Result<(), CompileError> {
            self.calls.push(format!("define {}", definition.id));
            Ok(())
        }

        fn on_begin_block(&mut self, _state: &DrawingState<'a>, block: &'a ApertureBlock) -> Result<(), CompileError> {
            self.calls.push(format!("begin {}", block.id));
            Ok(())
        }

        fn on_end_block(&mut self, _state: &DrawingState<'a>, block: &'a ApertureBlock) -> Result<(), CompileError> {
            self.calls.push(format!("end {}", block.id));
            Ok(())
        }

        fn on_flash(
            &mut self,
            _state: &DrawingState<'a>,
            aperture: &ApertureId,
            _target: &FlashTarget<'a>,
            position: Position,
        ) -> Result<(), CompileError> {
            if self.fail_on_flash {
                return Err(CompileError::ContourBufferNotSet);
            }
            self.calls
                .push(format!("flash {} at ({}, {})", aperture, position.x, position.y));
            Ok(())
        }

        fn on_draw_line(&mut self, _state: &DrawingState<'a>, segment: &DrawSegment) -> Result<(), CompileError> {
            self.calls.push(format!(
                "line ({}, {}) -> ({}, {})",
                segment.start.x, segment.start.y, segment.end.x, segment.end.y
            ));
            Ok(())
        }

        fn on_draw_arc(
            &mut self,
            _state: &DrawingState<'a>,
            _segment: &DrawSegment,
            direction: ArcDirection,
            interpolation: ArcInterpolation,
        ) -> Result<(), CompileError> {
            self.calls
                .push(format!("arc {:?} {:?}", direction, interpolation));
            Ok(())
        }

        fn on_region_line(&mut self, _state: &DrawingState<'a>, _segment: &DrawSegment) -> Result<(), CompileError> {
            self.calls.push("region line".to_string());
            Ok(())
        }

        fn on_region_arc(
            &mut self,
            _state: &DrawingState<'a>,
            _segment: &DrawSegment,
            direction: ArcDirection,
            interpolation: ArcInterpolation,
        ) -> Result<(), CompileError> {
            self.calls
                .push(format!("region arc {:?} {:?}", direction, interpolation));
            Ok(())
        }

        fn on_flush_region(&mut self, _state: &DrawingState<'a>) -> Result<(), CompileError> {
            self.calls.push("flush".to_string());
            Ok(())
        }

        fn on_end_of_file(&mut self, _state: &DrawingState<'a>) -> Result<(), CompileError> {
            self.calls.push("eof".to_string());
            Ok(())
        }
    }

    fn walk(nodes: &[Node], options: WalkerOptions) -> (Result<(), CompileError>, Vec<String>, Vec<Diagnostic>) {
        init_logging();
        let mut walker = AstWalker::new(Recorder::default(), options);
        let result = walker.walk(nodes);
        let (recorder, diagnostics) = walker.into_parts();
        (result, recorder.calls, diagnostics)
    }

    #[test]
    fn test_flash_uses_selected_aperture() {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            circle_aperture(10, 1.0),
            Node::SelectAperture(ApertureId::new(10)),
            Node::Flash(Coordinates::xy("10000", "20000")),
            Node::EndOfFile,
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls, vec!["define D10", "flash D10 at (1, 2)", "eof"]);
    }

    #[test]
    fn test_missing_coordinate_uses_current_position() {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            circle_aperture(10, 1.0),
            Node::SelectAperture(ApertureId::new(10)),
            Node::Move(Coordinates::xy("50000", "50000")),
            Node::Draw(Coordinates::new(None, Some("100000"))),
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls[1], "line (5, 5) -> (5, 10)");
    }

    #[rstest]
    #[case(PlotMode::ClockwiseArc, ArcInterpolation::MultiQuadrant, "arc Clockwise MultiQuadrant")]
    #[case(PlotMode::ClockwiseArc, ArcInterpolation::SingleQuadrant, "arc Clockwise SingleQuadrant")]
    #[case(PlotMode::CounterClockwiseArc, ArcInterpolation::MultiQuadrant, "arc CounterClockwise MultiQuadrant")]
    #[case(PlotMode::CounterClockwiseArc, ArcInterpolation::SingleQuadrant, "arc CounterClockwise SingleQuadrant")]
    fn test_draw_dispatch(#[case] plot_mode: PlotMode, #[case] interpolation: ArcInterpolation, #[case] expected: &str) {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            circle_aperture(10, 1.0),
            Node::SelectAperture(ApertureId::new(10)),
            Node::PlotMode(plot_mode),
            Node::ArcInterpolation(interpolation),
            Node::Draw(Coordinates::xy("10000", "10000")),
            Node::BeginRegion,
            Node::Draw(Coordinates::xy("0", "0")),
            Node::EndRegion,
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls[1], expected);
        assert_eq!(calls[2], format!("region {}", expected));
    }

    #[test]
    fn test_region_move_flushes_and_flash_is_ignored() {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            circle_aperture(10, 1.0),
            Node::SelectAperture(ApertureId::new(10)),
            Node::BeginRegion,
            Node::Move(Coordinates::xy("0", "0")),
            Node::Draw(Coordinates::xy("10000", "0")),
            Node::Flash(Coordinates::xy("10000", "10000")),
            Node::Move(Coordinates::xy("0", "0")),
            Node::EndRegion,
            Node::Draw(Coordinates::xy("10000", "0")),
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls, vec![
            "define D10",
            "flush",
            "region line",
            "flush",
            "line (0, 0) -> (1, 0)",
            "eof"
        ]);
    }

    #[test]
    fn test_draw_requires_selected_aperture() {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            Node::Draw(Coordinates::xy("10000", "0")),
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Err(CompileError::ApertureNotSelected));
        assert_eq!(calls, vec!["eof"]);
    }

    #[test]
    fn test_flash_of_undefined_aperture() {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            Node::SelectAperture(ApertureId::new(99)),
            Node::Flash(Coordinates::xy("0", "0")),
        ];

        // when
        let (result, _, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Err(CompileError::ApertureNotFound(ApertureId::new(99))));
    }

    #[rstest]
    #[case(false, vec!["eof"])]
    #[case(true, vec!["define D10", "eof"])]
    fn test_optional_stop(#[case] ignore_program_stop: bool, #[case] expected: Vec<&str>) {
        // given
        let nodes = vec![Node::OptionalStop, circle_aperture(10, 1.0)];
        let options = WalkerOptions {
            ignore_program_stop,
            ..WalkerOptions::default()
        };

        // when
        let (result, calls, _) = walk(&nodes, options);

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls, expected);
    }

    #[test]
    fn test_program_stop_halts_inside_block() {
        // given
        let nodes = vec![
            Node::ApertureBlock(ApertureBlock {
                id: ApertureId::new(12),
                nodes: vec![Node::ProgramStop, circle_aperture(10, 1.0)],
            }),
            circle_aperture(11, 1.0),
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls, vec!["begin D12", "end D12", "eof"]);
    }

    #[rstest]
    #[case(ErrorHandling::Raise, Err(CompileError::ContourBufferNotSet), 0)]
    #[case(ErrorHandling::Ignore, Ok(()), 0)]
    #[case(ErrorHandling::Warn, Ok(()), 1)]
    fn test_error_handling(
        #[case] error_handling: ErrorHandling,
        #[case] expected: Result<(), CompileError>,
        #[case] expected_diagnostics: usize,
    ) {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            circle_aperture(10, 1.0),
            Node::SelectAperture(ApertureId::new(10)),
            Node::Flash(Coordinates::xy("0", "0")),
            Node::Draw(Coordinates::xy("10000", "0")),
        ];
        let options = WalkerOptions {
            error_handling,
            ..WalkerOptions::default()
        };

        // when
        init_logging();
        let mut walker = AstWalker::new(
            Recorder {
                fail_on_flash: true,
                ..Recorder::default()
            },
            options,
        );
        let result = walker.walk(&nodes);

        // then
        assert_eq!(result, expected);
        assert_eq!(walker.diagnostics().len(), expected_diagnostics);
        if expected.is_ok() {
            // the node after the failing one was still visited
            assert!(walker
                .hooks()
                .calls
                .contains(&"line (0, 0) -> (1, 0)".to_string()));
        }
        // the failed flash did not move the current point
        assert_eq!(walker.state().current_position.x, if expected.is_ok() { 1.0 } else { 0.0 });
    }

    #[test]
    fn test_always_fatal_errors_ignore_error_handling() {
        // given
        let nodes = vec![
            unsupported_aperture(10),
            Node::SelectAperture(ApertureId::new(10)),
            circle_aperture(11, 1.0),
        ];
        let options = WalkerOptions {
            error_handling: ErrorHandling::Ignore,
            ..WalkerOptions::default()
        };

        // when
        let (result, calls, _) = walk(&nodes, options);

        // then
        assert_eq!(
            result,
            Err(CompileError::DirectApertureDispatchNotSupported(ApertureId::new(10)))
        );
        assert_eq!(calls, vec!["define D10", "eof"]);
    }

    #[test]
    fn test_block_restores_current_point() {
        // given
        let nodes = vec![
            Node::FormatSpecification(format_2_4()),
            circle_aperture(10, 1.0),
            Node::Move(Coordinates::xy("10000", "10000")),
            Node::ApertureBlock(ApertureBlock {
                id: ApertureId::new(12),
                nodes: vec![
                    Node::SelectAperture(ApertureId::new(10)),
                    Node::Flash(Coordinates::xy("50000", "50000")),
                ],
            }),
            Node::SelectAperture(ApertureId::new(12)),
            Node::Flash(Coordinates::new(None, Some(packed(2.0).as_str()))),
        ];

        // when
        let (result, calls, _) = walk(&nodes, WalkerOptions::default());

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(calls, vec![
            "define D10",
            "begin D12",
            "flash D10 at (5, 5)",
            "end D12",
            "flash D12 at (1, 2)",
            "eof"
        ]);
    }

    #[test]
    fn test_redefinition_refreshes_flash_target() {
        // given
        let nodes = vec![
            circle_aperture(10, 1.0),
            Node::SelectAperture(ApertureId::new(10)),
            unsupported_aperture(10),
        ];
        let mut walker = AstWalker::new(Recorder::default(), WalkerOptions::default());

        // when
        let result = walker.walk(&nodes);

        // then
        assert_eq!(
            result,
            Err(CompileError::DirectApertureDispatchNotSupported(ApertureId::new(10)))
        );
    }

    #[rstest]
    #[case::default(vec![], UnitMode::Metric)]
    #[case::inch(vec![Node::UnitMode(UnitMode::Imperial)], UnitMode::Imperial)]
    #[case::millimeter(vec![Node::UnitMode(UnitMode::Imperial), Node::UnitMode(UnitMode::Metric)], UnitMode::Metric)]
    #[case::legacy_inch(vec![Node::LegacyUnit(UnitMode::Imperial)], UnitMode::Imperial)]
    #[case::legacy_millimeter(vec![Node::UnitMode(UnitMode::Imperial), Node::LegacyUnit(UnitMode::Metric)], UnitMode::Metric)]
    #[case::legacy_overridden(vec![Node::LegacyUnit(UnitMode::Metric), Node::UnitMode(UnitMode::Imperial)], UnitMode::Imperial)]
    fn test_unit_mode(#[case] nodes: Vec<Node>, #[case] expected: UnitMode) {
        // given
        init_logging();
        let mut walker = AstWalker::new(Recorder::default(), WalkerOptions::default());

        // when
        let result = walker.walk(&nodes);

        // then
        assert_eq!(result, Ok(()));
        assert_eq!(walker.state().unit_mode, expected);
    }
}

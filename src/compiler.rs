//! Geometry synthesis.
//!
//! [`GeometryCompiler`] receives the walker callbacks and builds one [`CommandBuffer`] per aperture, per
//! transformed aperture and for the main image. [`Compiler`] runs a whole pass and resolves the buffers into
//! dependency ordered RVMC.

use std::collections::HashMap;

use log::{debug, info, trace, warn};

use crate::ast::{ApertureBlock, ApertureDefinition, ApertureId, ApertureTemplate, Node, StepRepeat};
use crate::error::CompileError;
use crate::geometry::BoundingBox;
use crate::rvmc::{Geometry, LayerId, PasteLayer, Rvmc, RvmcCommand, Shape, WithBoundingBox};
use crate::state::{ApertureRef, ArcDirection, ArcInterpolation, DrawingState, ObjectTransform, TransformTag};
use crate::types::Winding;
use crate::walker::{AstWalker, Diagnostic, DrawSegment, FlashTarget, WalkerHooks, WalkerOptions};
use crate::{Position, ToVector, Vector};

mod apertures;
mod arc;
mod buffer;
mod macros;
mod transform;

pub use arc::{resolve_arc, ArcSpan};
pub use buffer::{CommandBuffer, ContourBuffer, ContourSegment, LayerCommand};
pub use macros::MacroEvaluator;
pub use transform::GeometricTransform;

/// Compiles command nodes into RVMC.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: WalkerOptions,
}

impl Compiler {
    pub fn new(options: WalkerOptions) -> Self {
        Self {
            options,
        }
    }

    #[profiling::function]
    pub fn compile(&self, nodes: &[Node]) -> Result<Rvmc, CompileError> {
        self.compile_with_diagnostics(nodes)
            .map(|(rvmc, _)| rvmc)
    }

    /// Like [`Compiler::compile`], also returning the nodes skipped when errors are configured to warn.
    #[profiling::function]
    pub fn compile_with_diagnostics(&self, nodes: &[Node]) -> Result<(Rvmc, Vec<Diagnostic>), CompileError> {
        let mut walker = AstWalker::new(GeometryCompiler::default(), self.options.clone());
        walker.walk(nodes)?;

        let (compiler, diagnostics) = walker.into_parts();
        let rvmc = compiler.finish()?;

        Ok((rvmc, diagnostics))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Walker hooks which synthesize geometry into command buffers.
#[derive(Debug)]
pub struct GeometryCompiler {
    /// Completed buffers.
    registry: HashMap<LayerId, CommandBuffer>,
    /// Buffers being built, the main buffer is at the bottom.
    stack: Vec<CommandBuffer>,
    transform_cache: HashMap<(LayerId, TransformTag), LayerId>,
    contour: Option<ContourBuffer>,
    step_repeat_count: usize,
    transformed_builds: usize,
}

impl Default for GeometryCompiler {
    fn default() -> Self {
        Self {
            registry: HashMap::new(),
            stack: vec![CommandBuffer::new(LayerId::main())],
            transform_cache: HashMap::new(),
            contour: None,
            step_repeat_count: 0,
            transformed_builds: 0,
        }
    }
}

impl GeometryCompiler {
    /// How many transformed variants of buffers were synthesized.
    pub fn transformed_builds(&self) -> usize {
        self.transformed_builds
    }

    pub fn buffer(&self, id: &LayerId) -> Option<&CommandBuffer> {
        self.registry.get(id).or_else(|| {
            self.stack
                .iter()
                .find(|buffer| buffer.id == *id)
        })
    }

    pub fn contour(&self) -> Option<&ContourBuffer> {
        self.contour.as_ref()
    }

    fn current(&mut self) -> &mut CommandBuffer {
        // the main buffer is only taken off the stack by `finish`
        let index = self.stack.len() - 1;
        &mut self.stack[index]
    }

    fn register(&mut self, buffer: CommandBuffer) {
        debug!("buffer {}: {} commands", buffer.id, buffer.commands.len());
        // a redefined aperture invalidates its transformed variants
        self.transform_cache
            .retain(|(base, _), _| *base != buffer.id);
        self.registry.insert(buffer.id.clone(), buffer);
    }

    /// The id of `base` as transformed, building and caching the variant on first use.
    fn transformed_layer(&mut self, base: &LayerId, transform: &ObjectTransform) -> Result<LayerId, CompileError> {
        if !self.registry.contains_key(base) {
            return Err(CompileError::BufferNotFound(base.clone()));
        }
        if transform.is_geometric_identity() {
            return Ok(base.clone());
        }
        self.build_transformed(base, transform, &mut vec![])
    }

    fn build_transformed(
        &mut self,
        base: &LayerId,
        transform: &ObjectTransform,
        in_progress: &mut Vec<LayerId>,
    ) -> Result<LayerId, CompileError> {
        let key = (base.clone(), transform.tag());
        if let Some(id) = self.transform_cache.get(&key) {
            trace!("transform cache hit. base: {}, tag: {}", base, key.1);
            return Ok(id.clone());
        }
        if in_progress.contains(base) {
            return Err(CompileError::CyclicBufferDependency(base.clone()));
        }

        let source = self
            .registry
            .get(base)
            .ok_or_else(|| CompileError::BufferNotFound(base.clone()))?
            .clone();

        in_progress.push(base.clone());
        let id = LayerId::new(format!("{}[{}]", base, key.1));
        let mut transformed = CommandBuffer::new(id.clone());
        for command in &source.commands {
            match command {
                LayerCommand::Shape(shape) => transformed.push_shape(transform.apply_to_shape(shape)),
                LayerCommand::Paste(paste) => {
                    let nested = self.build_transformed(&paste.source, transform, in_progress)?;
                    transformed.paste(PasteLayer {
                        source: nested,
                        center: transform.apply_to_position(paste.center),
                        is_negative: paste.is_negative,
                    });
                }
            }
        }
        in_progress.pop();

        debug!("built transformed buffer {}", id);
        self.transformed_builds += 1;
        self.registry.insert(id.clone(), transformed);
        self.transform_cache.insert(key, id.clone());
        Ok(id)
    }

    /// Stroke width of the current aperture along `direction`, `None` for apertures without one.
    fn stroke_width(state: &DrawingState<'_>, start: Position, end: Position) -> Result<Option<f64>, CompileError> {
        let definition = match state.current_aperture()? {
            ApertureRef::Standard(definition) => definition,
            ApertureRef::Block(block) => {
                warn!("aperture block {} cannot be used to stroke, ignoring", block.id);
                return Ok(None);
            }
        };

        // extent of the transformed aperture across the path
        let projected = |x: f64, y: f64| {
            let direction = end - start;
            let length = direction.x.hypot(direction.y);
            let normal = match length > 0.0 {
                true => Vector::new(-direction.y / length, direction.x / length),
                false => Vector::new(0.0, 1.0),
            };
            let (min, max) = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .iter()
                .map(|(sign_x, sign_y)| {
                    let corner = state
                        .transform
                        .apply_to_position(Position::new(sign_x * x / 2.0, sign_y * y / 2.0));
                    corner.coords.dot(&normal)
                })
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), distance| {
                    (min.min(distance), max.max(distance))
                });
            max - min
        };

        let width = match &definition.template {
            ApertureTemplate::Circle(circle) => circle.diameter * state.transform.scale,
            ApertureTemplate::Rectangle(rectangle) | ApertureTemplate::Obround(rectangle) => {
                projected(rectangle.x, rectangle.y)
            }
            ApertureTemplate::Polygon(polygon) => polygon.outer_diameter * state.transform.scale,
            ApertureTemplate::Macro {
                name, ..
            } => {
                warn!("macro aperture {} ({}) cannot be used to stroke, ignoring", definition.id, name);
                return Ok(None);
            }
            ApertureTemplate::Unsupported {
                ..
            } => return Err(CompileError::DirectApertureDispatchNotSupported(definition.id.clone())),
        };

        Ok(Some(width))
    }

    fn push_capped(&mut self, start: Position, end: Position, width: f64, strokes: Vec<Geometry>, is_negative: bool) {
        let buffer = self.current();
        buffer.push_shape(Shape::new(
            Geometry::Circle {
                center: start,
                diameter: width,
            },
            is_negative,
        ));
        for stroke in strokes {
            buffer.push_shape(Shape::new(stroke, is_negative));
        }
        buffer.push_shape(Shape::new(
            Geometry::Circle {
                center: end,
                diameter: width,
            },
            is_negative,
        ));
    }

    fn flush_contour(&mut self, state: &DrawingState<'_>) -> Result<(), CompileError> {
        let contour = self
            .contour
            .as_mut()
            .ok_or(CompileError::ContourBufferNotSet)?;
        let segments = contour.len();
        if let Some(mut vertices) = contour.take_vertices() {
            trace!("region polygon from {} segments", segments);
            // positive area
            if matches!(Winding::from_vertices(&vertices), Winding::CounterClockwise) {
                vertices.reverse();
            }
            let is_negative = state.transform.polarity.is_negative();
            self.current()
                .push_shape(Shape::new(Geometry::Polygon {
                    vertices,
                }, is_negative));
        }
        Ok(())
    }

    /// Takes the main buffer off the stack and emits every buffer it depends on, dependencies first.
    #[profiling::function]
    pub fn finish(mut self) -> Result<Rvmc, CompileError> {
        if self.stack.len() > 1 {
            warn!("{} unterminated block(s) or step-repeat(s) discarded", self.stack.len() - 1);
        }
        self.stack.truncate(1);
        if let Some(main) = self.stack.pop() {
            self.registry.insert(main.id.clone(), main);
        }

        let order = resolve_order(&self.registry)?;

        let mut bounding_boxes: HashMap<&LayerId, BoundingBox> = HashMap::new();
        let mut commands = vec![];
        let mut shape_count = 0;
        for id in &order {
            let buffer = self
                .registry
                .get(id)
                .ok_or_else(|| CompileError::BufferNotFound(id.clone()))?;

            let mut bbox = BoundingBox::default();
            let mut layer_commands = Vec::with_capacity(buffer.commands.len());
            for command in &buffer.commands {
                match command {
                    LayerCommand::Shape(shape) => {
                        bbox.expand(&shape.bounding_box());
                        shape_count += 1;
                        layer_commands.push(RvmcCommand::Shape(shape.clone()));
                    }
                    LayerCommand::Paste(paste) => {
                        if let Some(pasted) = bounding_boxes.get(&paste.source) {
                            bbox.expand(&pasted.translated(paste.center.to_vector()));
                        }
                        layer_commands.push(RvmcCommand::PasteLayer(paste.clone()));
                    }
                }
            }

            commands.push(RvmcCommand::StartLayer {
                id: id.clone(),
                bounding_box: match bbox.is_empty() {
                    true => None,
                    false => Some(bbox.clone()),
                },
            });
            commands.extend(layer_commands);
            commands.push(RvmcCommand::EndLayer);
            bounding_boxes.insert(id, bbox);
        }

        info!("compiled {} layers, {} shapes", order.len(), shape_count);

        Ok(Rvmc::new(commands))
    }
}

/// Depth first post-order from the main buffer, so every buffer comes after the buffers it pastes.
#[profiling::function]
fn resolve_order(registry: &HashMap<LayerId, CommandBuffer>) -> Result<Vec<LayerId>, CompileError> {
    fn visit(
        id: &LayerId,
        registry: &HashMap<LayerId, CommandBuffer>,
        visits: &mut HashMap<LayerId, Visit>,
        order: &mut Vec<LayerId>,
    ) -> Result<(), CompileError> {
        match visits.get(id) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => return Err(CompileError::CyclicBufferDependency(id.clone())),
            None => {}
        }
        let buffer = registry
            .get(id)
            .ok_or_else(|| CompileError::BufferNotFound(id.clone()))?;

        visits.insert(id.clone(), Visit::InProgress);
        for dependency in &buffer.depends_on {
            visit(dependency, registry, visits, order)?;
        }
        visits.insert(id.clone(), Visit::Done);
        order.push(id.clone());
        Ok(())
    }

    let mut visits = HashMap::new();
    let mut order = vec![];
    visit(&LayerId::main(), registry, &mut visits, &mut order)?;
    trace!("layer order: {:?}", order);
    Ok(order)
}

impl<'a> WalkerHooks<'a> for GeometryCompiler {
    fn on_aperture_defined(
        &mut self,
        state: &DrawingState<'a>,
        definition: &'a ApertureDefinition,
    ) -> Result<(), CompileError> {
        let shapes = match &definition.template {
            ApertureTemplate::Circle(circle) => apertures::circle_shapes(circle),
            ApertureTemplate::Rectangle(rectangle) => apertures::rectangle_shapes(rectangle),
            ApertureTemplate::Obround(obround) => apertures::obround_shapes(obround),
            ApertureTemplate::Polygon(polygon) => apertures::polygon_shapes(polygon),
            ApertureTemplate::Macro {
                name,
                parameters,
            } => {
                let macro_definition = state
                    .macro_definition(name)
                    .ok_or_else(|| CompileError::MacroNotDefined(name.clone()))?;
                MacroEvaluator::new(macro_definition, parameters).evaluate()?
            }
            ApertureTemplate::Unsupported {
                name,
            } => {
                debug!("aperture {} uses unsupported template '{}', no geometry", definition.id, name);
                let id = LayerId::from(&definition.id);
                self.registry.remove(&id);
                self.transform_cache
                    .retain(|(base, _), _| *base != id);
                return Ok(());
            }
        };

        let mut buffer = CommandBuffer::new(LayerId::from(&definition.id));
        for shape in shapes {
            buffer.push_shape(shape);
        }
        self.register(buffer);
        Ok(())
    }

    fn on_begin_block(&mut self, _state: &DrawingState<'a>, block: &'a ApertureBlock) -> Result<(), CompileError> {
        debug!("begin aperture block {}", block.id);
        self.stack
            .push(CommandBuffer::new(LayerId::from(&block.id)));
        Ok(())
    }

    fn on_end_block(&mut self, _state: &DrawingState<'a>, block: &'a ApertureBlock) -> Result<(), CompileError> {
        let id = LayerId::from(&block.id);
        match self.stack.last() {
            Some(buffer) if buffer.id == id && self.stack.len() > 1 => {}
            _ => return Err(CompileError::BufferNotFound(id)),
        }
        if let Some(buffer) = self.stack.pop() {
            self.register(buffer);
        }
        Ok(())
    }

    fn on_begin_step_repeat(
        &mut self,
        _state: &DrawingState<'a>,
        step_repeat: &'a StepRepeat,
    ) -> Result<(), CompileError> {
        self.step_repeat_count += 1;
        let id = LayerId::new(format!("SR-{}", self.step_repeat_count));
        debug!(
            "begin step-repeat {}. x: {} * {}, y: {} * {}",
            id, step_repeat.x_repeats, step_repeat.x_delta, step_repeat.y_repeats, step_repeat.y_delta
        );
        self.stack.push(CommandBuffer::new(id));
        Ok(())
    }

    fn on_end_step_repeat(
        &mut self,
        _state: &DrawingState<'a>,
        step_repeat: &'a StepRepeat,
    ) -> Result<(), CompileError> {
        if self.stack.len() < 2 {
            return Err(CompileError::BufferNotFound(LayerId::new(format!(
                "SR-{}",
                self.step_repeat_count
            ))));
        }
        let Some(body) = self.stack.pop() else {
            return Ok(());
        };

        let parent = self.current();
        for j in 0..step_repeat.y_repeats {
            for i in 0..step_repeat.x_repeats {
                let offset = Vector::new(step_repeat.x_delta * i as f64, step_repeat.y_delta * j as f64);
                parent.extend_translated(&body, offset);
            }
        }
        trace!("step-repeat {} expanded into {}", body.id, parent.id);
        Ok(())
    }

    fn on_flash(
        &mut self,
        state: &DrawingState<'a>,
        aperture: &ApertureId,
        target: &FlashTarget<'a>,
        position: Position,
    ) -> Result<(), CompileError> {
        let base = LayerId::from(aperture);
        if self
            .stack
            .iter()
            .any(|buffer| buffer.id == base)
        {
            return Err(CompileError::CyclicBufferDependency(base));
        }
        trace!("flash {} ({:?}) at {:?}", aperture, target, position);

        let source = self.transformed_layer(&base, &state.transform)?;
        self.current().paste(PasteLayer {
            source,
            center: position,
            is_negative: state.transform.polarity.is_negative(),
        });
        Ok(())
    }

    fn on_draw_line(&mut self, state: &DrawingState<'a>, segment: &DrawSegment) -> Result<(), CompileError> {
        let Some(width) = Self::stroke_width(state, segment.start, segment.end)? else {
            return Ok(());
        };
        let line = Geometry::Line {
            start: segment.start,
            end: segment.end,
            width,
        };
        self.push_capped(
            segment.start,
            segment.end,
            width,
            vec![line],
            state.transform.polarity.is_negative(),
        );
        Ok(())
    }

    fn on_draw_arc(
        &mut self,
        state: &DrawingState<'a>,
        segment: &DrawSegment,
        direction: ArcDirection,
        interpolation: ArcInterpolation,
    ) -> Result<(), CompileError> {
        let Some(width) = Self::stroke_width(state, segment.start, segment.end)? else {
            return Ok(());
        };
        let strokes = resolve_arc(segment, direction, interpolation)
            .into_iter()
            .map(|span| Geometry::Arc {
                center: span.center,
                radius: span.radius,
                start_angle: span.start_angle,
                sweep_angle: span.sweep_angle,
                width,
            })
            .collect();
        self.push_capped(
            segment.start,
            segment.end,
            width,
            strokes,
            state.transform.polarity.is_negative(),
        );
        Ok(())
    }

    fn on_begin_region(&mut self, _state: &DrawingState<'a>) -> Result<(), CompileError> {
        self.contour = Some(ContourBuffer::default());
        Ok(())
    }

    fn on_region_line(&mut self, _state: &DrawingState<'a>, segment: &DrawSegment) -> Result<(), CompileError> {
        let contour = self
            .contour
            .as_mut()
            .ok_or(CompileError::ContourBufferNotSet)?;
        contour.push(segment.start, ContourSegment::Line {
            end: segment.end,
        });
        Ok(())
    }

    fn on_region_arc(
        &mut self,
        _state: &DrawingState<'a>,
        segment: &DrawSegment,
        direction: ArcDirection,
        interpolation: ArcInterpolation,
    ) -> Result<(), CompileError> {
        let contour = self
            .contour
            .as_mut()
            .ok_or(CompileError::ContourBufferNotSet)?;
        let spans = resolve_arc(segment, direction, interpolation);
        let last = spans.len().saturating_sub(1);
        for (index, span) in spans.into_iter().enumerate() {
            // only the final span ends on the commanded point, a full circle comes back as two halves
            let end = match index == last {
                true => segment.end,
                false => span
                    .points()
                    .last()
                    .copied()
                    .unwrap_or(segment.end),
            };
            contour.push(segment.start, ContourSegment::Arc {
                span,
                end,
            });
        }
        Ok(())
    }

    fn on_flush_region(&mut self, state: &DrawingState<'a>) -> Result<(), CompileError> {
        self.flush_contour(state)
    }

    fn on_end_region(&mut self, state: &DrawingState<'a>) -> Result<(), CompileError> {
        let result = self.flush_contour(state);
        self.contour = None;
        result
    }

    fn on_end_of_file(&mut self, _state: &DrawingState<'a>) -> Result<(), CompileError> {
        if let Some(contour) = self.contour.take() {
            if !contour.is_empty() {
                debug!("discarding unterminated region contour of {} segments", contour.len());
            }
        }
        Ok(())
    }
}

use std::collections::BTreeSet;

use log::{trace, warn};

use crate::compiler::arc::ArcSpan;
use crate::rvmc::{LayerId, PasteLayer, Shape};
use crate::spacial::deduplicate::DedupEpsilon;
use crate::types::signed_area;
use crate::{Position, Vector};

#[derive(Debug, Clone, PartialEq)]
pub enum LayerCommand {
    Shape(Shape),
    Paste(PasteLayer),
}

/// The draw commands of one layer, in the order they were produced.
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    pub id: LayerId,
    pub commands: Vec<LayerCommand>,
    pub depends_on: BTreeSet<LayerId>,
}

impl CommandBuffer {
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            commands: vec![],
            depends_on: BTreeSet::new(),
        }
    }

    pub fn push_shape(&mut self, shape: Shape) {
        self.commands.push(LayerCommand::Shape(shape));
    }

    pub fn paste(&mut self, paste: PasteLayer) {
        self.depends_on.insert(paste.source.clone());
        self.commands.push(LayerCommand::Paste(paste));
    }

    /// Appends a copy of `other`, moved by `offset`.
    pub fn extend_translated(&mut self, other: &CommandBuffer, offset: Vector) {
        for command in &other.commands {
            match command {
                LayerCommand::Shape(shape) => self.push_shape(shape.translated(offset)),
                LayerCommand::Paste(paste) => self.paste(PasteLayer {
                    center: paste.center + offset,
                    ..paste.clone()
                }),
            }
        }
    }

    pub fn shape_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, LayerCommand::Shape(_)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContourSegment {
    Line { end: Position },
    Arc { span: ArcSpan, end: Position },
}

/// Boundary segments of the region contour being built.
#[derive(Debug, Clone, Default)]
pub struct ContourBuffer {
    start: Option<Position>,
    segments: Vec<ContourSegment>,
}

impl ContourBuffer {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// The first segment fixes the start of the contour.
    pub fn push(&mut self, start: Position, segment: ContourSegment) {
        if self.segments.is_empty() {
            self.start = Some(start);
        }
        self.segments.push(segment);
    }

    /// Takes the accumulated segments as polygon vertices, leaving the buffer empty.
    ///
    /// Returns `None` when there is nothing to fill.
    pub fn take_vertices(&mut self) -> Option<Vec<Position>> {
        let start = self.start.take()?;
        let segments = std::mem::take(&mut self.segments);
        if segments.is_empty() {
            return None;
        }

        let mut vertices = vec![start];
        for segment in &segments {
            match segment {
                ContourSegment::Line {
                    end,
                } => vertices.push(*end),
                ContourSegment::Arc {
                    span,
                    end,
                } => {
                    vertices.extend(span.points().into_iter().skip(1));
                    // the sampled end can differ from the commanded end by rounding
                    vertices.pop();
                    vertices.push(*end);
                }
            }
        }
        trace!("contour vertices: {}", vertices.len());

        let vertices = vertices.dedup_with_epsilon(1e-6);
        // dedup keeps the input when too few vertices would remain
        if vertices.len() < 3 || signed_area(&vertices).abs() < 1e-12 {
            warn!("region contour with less than 3 distinct vertices, ignoring");
            return None;
        }
        Some(vertices)
    }
}

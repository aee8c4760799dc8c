use lyon::tessellation::TessellationError;

use crate::Position;

#[derive(Debug, Clone)]
pub struct PolygonMesh {
    pub vertices: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl PolygonMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Triangle fan from the first vertex, only valid for convex polygons.
pub fn fan_polygon(vertices: &[Position]) -> PolygonMesh {
    let indices = (1..vertices.len().saturating_sub(1) as u32)
        .flat_map(|i| [0, i, i + 1])
        .collect();

    PolygonMesh {
        vertices: vertices
            .iter()
            .map(|vertex| [vertex.x as f32, vertex.y as f32])
            .collect(),
        indices,
    }
}

pub fn tessellate_polygon(vertices: &[Position]) -> Result<PolygonMesh, TessellationError> {
    use lyon::path::Path;
    use lyon::tessellation::{BuffersBuilder, FillOptions, FillRule, FillTessellator, VertexBuffers};

    let mut path_builder = Path::builder();
    if let Some(first) = vertices.first() {
        path_builder.begin(lyon::math::Point::new(first.x as f32, first.y as f32));
        for pos in &vertices[1..] {
            path_builder.line_to(lyon::math::Point::new(pos.x as f32, pos.y as f32));
        }
        path_builder.close();
    }
    let path = path_builder.build();

    let mut geometry = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();

    tessellator.tessellate_path(
        &path,
        &FillOptions::default().with_fill_rule(FillRule::EvenOdd),
        &mut BuffersBuilder::new(&mut geometry, |vertex: lyon::tessellation::FillVertex| {
            [vertex.position().x, vertex.position().y]
        }),
    )?;

    Ok(PolygonMesh {
        vertices: geometry.vertices,
        indices: geometry.indices,
    })
}

#[cfg(test)]
mod mesh_tests {
    use super::*;

    #[test]
    fn test_concave_outline_tessellation() {
        // given
        let notched = [
            Position::new(0.0, 0.0),
            Position::new(2.0, 0.0),
            Position::new(2.0, 2.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 2.0),
        ];

        // when
        let mesh = tessellate_polygon(&notched).unwrap();

        // then
        // a simple polygon with n vertices needs at least n - 2 triangles
        assert!(mesh.triangle_count() >= 3);
        assert!(mesh.vertices.len() >= 5);
    }

    #[test]
    fn test_fan() {
        let square = [
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 1.0),
        ];

        let mesh = fan_polygon(&square);

        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices.len(), 4);
    }
}

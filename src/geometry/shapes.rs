use crate::Position;

pub fn is_convex(vertices: &[Position]) -> bool {
    if vertices.len() < 3 {
        return true;
    }

    let n = vertices.len();
    let mut sign = 0;

    for i in 0..n {
        let p1 = vertices[i];
        let p2 = vertices[(i + 1) % n];
        let p3 = vertices[(i + 2) % n];

        let v1 = p2 - p1;
        let v2 = p3 - p2;

        // Cross product in 2D
        let cross = v1.x * v2.y - v1.y * v2.x;

        if sign == 0 {
            sign = if cross > 0.0 { 1 } else { -1 };
        } else if (cross > 0.0 && sign < 0) || (cross < 0.0 && sign > 0) {
            return false;
        }
    }

    true
}

/// Vertices of a regular polygon centered on the origin, the first vertex at `rotation_degrees`.
pub fn regular_polygon_vertices(diameter: f64, vertices_count: usize, rotation_degrees: f64) -> Vec<Position> {
    let radius = diameter / 2.0;
    let rotation_radians = rotation_degrees.to_radians();

    (0..vertices_count)
        .map(|i| {
            let angle = (2.0 * std::f64::consts::PI * i as f64) / vertices_count as f64 + rotation_radians;
            Position::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

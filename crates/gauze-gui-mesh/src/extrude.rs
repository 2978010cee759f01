//! Prism extrusion of a flat polygon into renderable mesh data.

use glam::{Vec2, Vec3, Vec4};
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, VertexBuffers,
};

const CLOSING_POINT_EPSILON: f32 = 1.0e-8;

/// CPU-side mesh buffers, ready for upload by the host engine
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Present only when face colors were requested
    pub colors: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Face slots of an extruded polygon: top cap, side ring, bottom cap
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Face {
    Top = 0,
    Side = 1,
    Bottom = 2,
}

/// Options for [`extrude_polygon`]
#[derive(Clone, Debug)]
pub struct ExtrudeOptions {
    /// Extrusion depth below the y=0 plane. Zero produces only the top cap.
    pub depth: f32,
    /// Texture sub-rectangles `(u0, v0, u1, v1)` per face slot
    pub face_uv: [Vec4; 3],
    /// Optional RGBA color per face slot
    pub face_colors: Option<[[f32; 4]; 3]>,
    /// Wrap the side texture around the perimeter instead of repeating it
    /// per edge
    pub wrap_uv: bool,
}

impl Default for ExtrudeOptions {
    fn default() -> Self {
        Self {
            depth: 0.0,
            face_uv: [Vec4::new(0.0, 0.0, 1.0, 1.0); 3],
            face_colors: None,
            wrap_uv: false,
        }
    }
}

/// Extrude a polygon outline (in the XoZ plane, y ignored) into a prism
/// mesh: a tessellated top cap at y=0, a bottom cap at y=-depth and quad
/// side walls. A duplicated closing point in the outline is dropped.
pub fn extrude_polygon(outline: &[Vec3], options: &ExtrudeOptions) -> MeshData {
    let mut contour: Vec<Vec2> = outline.iter().map(|p| Vec2::new(p.x, p.z)).collect();
    if contour.len() >= 2 {
        let first = contour[0];
        let last = contour[contour.len() - 1];
        if first.distance_squared(last) <= CLOSING_POINT_EPSILON {
            contour.pop();
        }
    }
    if contour.len() < 3 {
        log::warn!("polygon outline has fewer than 3 distinct points, producing an empty mesh");
        return MeshData::default();
    }

    let mut mesh = MeshData {
        colors: options.face_colors.map(|_| Vec::new()),
        ..MeshData::default()
    };

    let cap = tessellate_cap(&contour);
    let bounds = contour_bounds(&contour);

    emit_cap(&mut mesh, &cap, bounds, 0.0, [0.0, 1.0, 0.0], options, Face::Top);
    if options.depth > 0.0 {
        emit_cap(
            &mut mesh,
            &cap,
            bounds,
            -options.depth,
            [0.0, -1.0, 0.0],
            options,
            Face::Bottom,
        );
        emit_sides(&mut mesh, &contour, options);
    }

    mesh
}

fn tessellate_cap(contour: &[Vec2]) -> VertexBuffers<[f32; 2], u32> {
    let mut builder = Path::builder();
    builder.begin(point(contour[0].x, contour[0].y));
    for p in &contour[1..] {
        builder.line_to(point(p.x, p.y));
    }
    builder.close();
    let path = builder.build();

    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    let result = tessellator.tessellate_path(
        &path,
        &FillOptions::default(),
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
            vertex.position().to_array()
        }),
    );
    if let Err(error) = result {
        log::warn!("cap tessellation failed: {error:?}");
        geometry.vertices.clear();
        geometry.indices.clear();
    }
    geometry
}

fn contour_bounds(contour: &[Vec2]) -> (Vec2, Vec2) {
    let mut min = contour[0];
    let mut max = contour[0];
    for p in contour {
        min = min.min(*p);
        max = max.max(*p);
    }
    (min, max)
}

fn emit_cap(
    mesh: &mut MeshData,
    cap: &VertexBuffers<[f32; 2], u32>,
    bounds: (Vec2, Vec2),
    y: f32,
    normal: [f32; 3],
    options: &ExtrudeOptions,
    face: Face,
) {
    let base = mesh.positions.len() as u32;
    let rect = options.face_uv[face as usize];
    let (min, max) = bounds;
    let extent = (max - min).max(Vec2::splat(f32::EPSILON));

    for vertex in &cap.vertices {
        mesh.positions.push([vertex[0], y, vertex[1]]);
        mesh.normals.push(normal);
        let t = (Vec2::from(*vertex) - min) / extent;
        mesh.uvs.push([
            rect.x + t.x * (rect.z - rect.x),
            rect.y + t.y * (rect.w - rect.y),
        ]);
        push_face_color(mesh, options, face);
    }

    // The bottom cap faces down: reverse the winding
    for triangle in cap.indices.chunks_exact(3) {
        if normal[1] >= 0.0 {
            mesh.indices
                .extend([base + triangle[0], base + triangle[1], base + triangle[2]]);
        } else {
            mesh.indices
                .extend([base + triangle[2], base + triangle[1], base + triangle[0]]);
        }
    }
}

fn emit_sides(mesh: &mut MeshData, contour: &[Vec2], options: &ExtrudeOptions) {
    let rect = options.face_uv[Face::Side as usize];
    let depth = options.depth;

    // Cumulative perimeter lengths for wrap-around texturing
    let mut cumulative = Vec::with_capacity(contour.len() + 1);
    cumulative.push(0.0_f32);
    let mut total = 0.0_f32;
    for i in 0..contour.len() {
        let next = contour[(i + 1) % contour.len()];
        total += contour[i].distance(next);
        cumulative.push(total);
    }
    let total = total.max(f32::EPSILON);

    for i in 0..contour.len() {
        let p0 = contour[i];
        let p1 = contour[(i + 1) % contour.len()];
        let edge = p1 - p0;
        if edge.length_squared() <= f32::EPSILON {
            continue;
        }
        let normal = Vec2::new(edge.y, -edge.x).normalize();
        let normal = [normal.x, 0.0, normal.y];

        let (u0, u1) = if options.wrap_uv {
            (
                rect.x + (rect.z - rect.x) * cumulative[i] / total,
                rect.x + (rect.z - rect.x) * cumulative[i + 1] / total,
            )
        } else {
            (rect.x, rect.z)
        };

        let base = mesh.positions.len() as u32;
        let corners = [
            ([p0.x, 0.0, p0.y], [u0, rect.w]),
            ([p1.x, 0.0, p1.y], [u1, rect.w]),
            ([p1.x, -depth, p1.y], [u1, rect.y]),
            ([p0.x, -depth, p0.y], [u0, rect.y]),
        ];
        for (position, uv) in corners {
            mesh.positions.push(position);
            mesh.normals.push(normal);
            mesh.uvs.push(uv);
            push_face_color(mesh, options, Face::Side);
        }
        mesh.indices
            .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

fn push_face_color(mesh: &mut MeshData, options: &ExtrudeOptions, face: Face) {
    if let (Some(colors), Some(face_colors)) = (&mut mesh.colors, &options.face_colors) {
        colors.push(face_colors[face as usize]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 2.0),
        ]
    }

    #[test]
    fn test_flat_polygon_has_only_a_top_cap() {
        let mesh = extrude_polygon(&square(), &ExtrudeOptions::default());
        assert!(mesh.triangle_count() >= 2);
        assert!(mesh.positions.iter().all(|p| p[1] == 0.0));
        assert!(mesh.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_extrusion_adds_bottom_cap_and_sides() {
        let options = ExtrudeOptions {
            depth: 2.0,
            ..Default::default()
        };
        let mesh = extrude_polygon(&square(), &options);

        let top = mesh.positions.iter().filter(|p| p[1] == 0.0).count();
        let bottom = mesh.positions.iter().filter(|p| p[1] == -2.0).count();
        // Sides contribute to both planes, caps to one each
        assert!(top >= 4 + 8);
        assert!(bottom >= 4 + 8);

        // Side normals are horizontal
        let horizontal = mesh.normals.iter().filter(|n| n[1] == 0.0).count();
        assert_eq!(horizontal, 16);

        // Every index is in range
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|index| *index < count));
    }

    #[test]
    fn test_duplicated_closing_point_is_dropped() {
        let mut closed = square();
        closed.push(Vec3::new(0.0, 0.0, 0.0));
        let open_mesh = extrude_polygon(&square(), &ExtrudeOptions::default());
        let closed_mesh = extrude_polygon(&closed, &ExtrudeOptions::default());
        assert_eq!(open_mesh.vertex_count(), closed_mesh.vertex_count());
    }

    #[test]
    fn test_cap_uvs_fill_the_face_rect() {
        let options = ExtrudeOptions {
            face_uv: [
                Vec4::new(0.25, 0.25, 0.75, 0.75),
                Vec4::new(0.0, 0.0, 1.0, 1.0),
                Vec4::new(0.0, 0.0, 1.0, 1.0),
            ],
            ..Default::default()
        };
        let mesh = extrude_polygon(&square(), &options);
        for uv in &mesh.uvs {
            assert!(uv[0] >= 0.25 - 1e-5 && uv[0] <= 0.75 + 1e-5);
            assert!(uv[1] >= 0.25 - 1e-5 && uv[1] <= 0.75 + 1e-5);
        }
    }

    #[test]
    fn test_wrapped_side_uvs_advance_along_the_perimeter() {
        let options = ExtrudeOptions {
            depth: 1.0,
            wrap_uv: true,
            ..Default::default()
        };
        let mesh = extrude_polygon(&square(), &options);

        // Square perimeter of 8: each edge covers a quarter of the texture
        let side_uvs: Vec<&[f32; 2]> = mesh
            .uvs
            .iter()
            .zip(&mesh.normals)
            .filter(|(_, n)| n[1] == 0.0)
            .map(|(uv, _)| uv)
            .collect();
        assert_eq!(side_uvs[0][0], 0.0);
        assert_eq!(side_uvs[1][0], 0.25);
        assert_eq!(side_uvs[4][0], 0.25);
        assert_eq!(side_uvs[5][0], 0.5);
    }

    #[test]
    fn test_face_colors_cover_every_vertex() {
        let options = ExtrudeOptions {
            depth: 1.0,
            face_colors: Some([
                [1.0, 0.0, 0.0, 1.0],
                [0.0, 1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0, 1.0],
            ]),
            ..Default::default()
        };
        let mesh = extrude_polygon(&square(), &options);
        let colors = mesh.colors.as_ref().expect("colors requested");
        assert_eq!(colors.len(), mesh.vertex_count());
        assert!(colors.contains(&[1.0, 0.0, 0.0, 1.0]));
        assert!(colors.contains(&[0.0, 1.0, 0.0, 1.0]));
        assert!(colors.contains(&[0.0, 0.0, 1.0, 1.0]));
    }

    #[test]
    fn test_degenerate_outline_produces_empty_mesh() {
        let mesh = extrude_polygon(
            &[Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            &ExtrudeOptions::default(),
        );
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }
}

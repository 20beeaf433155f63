use ahash::HashMap;
use tessera::{
    Color, GeometryKind, GeometryResult, LineJoin, NodeId, Primitive, ShapeTree, Stream, Stroke,
    Style, TextureId, TextureInfo, Transform, Vertex,
};

use crate::expectations::{Check, GeometryExpectation};

// ── Grid layout constants ────────────────────────────────────────────────────

const TILE_SIZE: u32 = 80;
const COLUMNS: u32 = 5;
const ROWS: u32 = 3;

pub const CANVAS_WIDTH: u32 = TILE_SIZE * COLUMNS;
pub const CANVAS_HEIGHT: u32 = TILE_SIZE * ROWS;

const CHECKERBOARD_TEXTURE_ID: TextureId = TextureId(100);

const RED: Color = Color([255, 0, 0, 255]);
const GREEN: Color = Color([0, 255, 0, 255]);
const BLUE: Color = Color([0, 0, 255, 255]);

/// Returns the pixel origin (top-left corner) of tile number `n` (1-based).
fn tile_origin(tile_number: u32) -> (f32, f32) {
    let index = tile_number - 1;
    let column = index % COLUMNS;
    let row = index / COLUMNS;
    ((column * TILE_SIZE) as f32, (row * TILE_SIZE) as f32)
}

/// Textures referenced by the main scene.
pub fn scene_textures() -> HashMap<TextureId, TextureInfo> {
    let mut textures = HashMap::default();
    textures.insert(CHECKERBOARD_TEXTURE_ID, TextureInfo::new(64, 64));
    textures
}

/// Builds the main test scene under the tree's root and returns the expectations to validate
/// once the tree has been tessellated with [`scene_textures`].
pub fn build_main_scene(tree: &mut ShapeTree) -> GeometryResult<Vec<GeometryExpectation>> {
    let mut expectations: Vec<GeometryExpectation> = Vec::new();
    let root = tree.root();

    expectations.extend(tile_01_rect_solid(tree, root)?);
    expectations.extend(tile_02_rounded_rect(tree, root)?);
    expectations.extend(tile_03_path_triangle(tree, root)?);
    expectations.extend(tile_04_path_bezier(tree, root)?);
    expectations.extend(tile_05_square_with_hole(tree, root)?);
    expectations.extend(tile_06_mitered_stroke(tree, root)?);
    expectations.extend(tile_07_translated_group(tree, root)?);
    expectations.extend(tile_08_nested_transforms(tree, root)?);
    expectations.extend(tile_09_ellipse(tree, root)?);
    expectations.extend(tile_10_triangles_geometry(tree, root)?);
    expectations.extend(tile_11_textured_rect(tree, root)?);
    expectations.extend(tile_12_textured_with_stroke(tree, root)?);
    expectations.extend(tile_13_vertex_colors(tree, root)?);
    expectations.extend(tile_14_points(tree, root)?);

    Ok(expectations)
}

fn closed_path(
    tree: &mut ShapeTree,
    parent: NodeId,
    style: Style,
    points: &[(f32, f32)],
) -> GeometryResult<NodeId> {
    let path = tree.create_path(parent, style)?;
    for &p in points {
        tree.vertex(path, p)?;
    }
    tree.end_shape(path, true)?;
    Ok(path)
}

fn tile_01_rect_solid(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(1);
    let rect = tree.create_primitive(
        root,
        Primitive::rect(ox + 10.0, oy + 10.0, 60.0, 60.0),
        Style::fill_only(RED),
    )?;
    Ok(vec![
        GeometryExpectation::new(rect, Check::Vertices(Stream::Fill, 4), "t01 rect vertices"),
        GeometryExpectation::new(rect, Check::Indices(Stream::Fill, 6), "t01 rect indices"),
        GeometryExpectation::new(rect, Check::DrawCalls(Stream::Fill, 1), "t01 rect draws"),
        GeometryExpectation::new(
            rect,
            Check::Position {
                vertex: 0,
                position: [ox + 10.0, oy + 10.0, 0.0],
            },
            "t01 rect corner",
        ),
        GeometryExpectation::new(
            rect,
            Check::FillColor {
                vertex: 3,
                rgba: RED.0,
            },
            "t01 rect color",
        ),
    ])
}

fn tile_02_rounded_rect(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(2);
    let rect = tree.create_primitive(
        root,
        Primitive::rounded_rect(ox + 10.0, oy + 10.0, 60.0, 60.0, 12.0),
        Style::fill_only(BLUE),
    )?;
    Ok(vec![
        GeometryExpectation::new(rect, Check::MinVertices(Stream::Fill, 8), "t02 corners"),
        GeometryExpectation::new(rect, Check::DrawCalls(Stream::Fill, 1), "t02 draws"),
        GeometryExpectation::new(rect, Check::Empty(Stream::Line), "t02 no 3d lines"),
    ])
}

fn tile_03_path_triangle(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(3);
    let triangle = closed_path(
        tree,
        root,
        Style::fill_only(GREEN),
        &[(ox + 40.0, oy + 10.0), (ox + 70.0, oy + 70.0), (ox + 10.0, oy + 70.0)],
    )?;
    Ok(vec![
        GeometryExpectation::new(triangle, Check::Vertices(Stream::Fill, 3), "t03 vertices"),
        GeometryExpectation::new(triangle, Check::Indices(Stream::Fill, 3), "t03 indices"),
    ])
}

fn tile_04_path_bezier(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(4);
    let path = tree.create_path(root, Style::fill_only(RED))?;
    tree.vertex(path, (ox + 10.0, oy + 70.0))?;
    tree.bezier_vertex(
        path,
        (ox + 10.0, oy + 10.0),
        (ox + 70.0, oy + 10.0),
        (ox + 70.0, oy + 70.0),
    )?;
    tree.end_shape(path, true)?;
    Ok(vec![
        GeometryExpectation::new(path, Check::MinVertices(Stream::Fill, 20), "t04 flattened"),
        GeometryExpectation::new(path, Check::DrawCalls(Stream::Fill, 1), "t04 draws"),
    ])
}

fn tile_05_square_with_hole(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(5);
    let path = tree.create_path(root, Style::fill_only(BLUE))?;
    for p in [(10.0, 10.0), (70.0, 10.0), (70.0, 70.0), (10.0, 70.0)] {
        tree.vertex(path, (ox + p.0, oy + p.1))?;
    }
    tree.break_contour(path)?;
    for p in [(30.0, 30.0), (50.0, 30.0), (50.0, 50.0), (30.0, 50.0)] {
        tree.vertex(path, (ox + p.0, oy + p.1))?;
    }
    tree.end_shape(path, true)?;
    // Eight triangles triangulate a quad with a quad hole.
    Ok(vec![
        GeometryExpectation::new(path, Check::MinVertices(Stream::Fill, 8), "t05 vertices"),
        GeometryExpectation::new(path, Check::Indices(Stream::Fill, 24), "t05 indices"),
    ])
}

fn tile_06_mitered_stroke(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(6);
    let stroke = Stroke::new(4.0, Color::BLACK).with_join(LineJoin::Miter);
    let rect = tree.create_primitive(
        root,
        Primitive::rect(ox + 10.0, oy + 10.0, 60.0, 60.0),
        Style::stroke_only(stroke),
    )?;
    Ok(vec![
        GeometryExpectation::new(rect, Check::MinVertices(Stream::Fill, 8), "t06 outline"),
        GeometryExpectation::new(rect, Check::DrawCalls(Stream::Fill, 1), "t06 draws"),
        GeometryExpectation::new(rect, Check::Empty(Stream::Line), "t06 2d stroke"),
    ])
}

fn tile_07_translated_group(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(7);
    let group = tree.create_group(root)?;
    tree.apply_transform(group, &Transform::translation(ox, oy, 0.0))?;
    let rect = tree.create_primitive(
        group,
        Primitive::rect(10.0, 10.0, 60.0, 60.0),
        Style::fill_only(GREEN),
    )?;
    Ok(vec![GeometryExpectation::new(
        rect,
        Check::Position {
            vertex: 2,
            position: [ox + 70.0, oy + 70.0, 0.0],
        },
        "t07 translated corner",
    )])
}

fn tile_08_nested_transforms(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(8);
    let outer = tree.create_group(root)?;
    tree.apply_transform(outer, &Transform::translation(ox, oy, 0.0))?;
    let inner = tree.create_group(outer)?;
    tree.apply_transform(inner, &Transform::scale(2.0, 2.0, 1.0))?;
    let rect = tree.create_primitive(
        inner,
        Primitive::rect(5.0, 5.0, 30.0, 30.0),
        Style::fill_only(RED),
    )?;
    Ok(vec![
        GeometryExpectation::new(
            rect,
            Check::Position {
                vertex: 0,
                position: [ox + 10.0, oy + 10.0, 0.0],
            },
            "t08 scaled then translated",
        ),
        GeometryExpectation::new(outer, Check::Vertices(Stream::Fill, 4), "t08 group range"),
    ])
}

fn tile_09_ellipse(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(9);
    let ellipse = tree.create_primitive(
        root,
        Primitive::ellipse(ox + 40.0, oy + 40.0, 60.0, 40.0),
        Style::fill_only(BLUE),
    )?;
    Ok(vec![
        GeometryExpectation::new(ellipse, Check::MinVertices(Stream::Fill, 20), "t09 segments"),
        GeometryExpectation::new(
            ellipse,
            Check::Position {
                vertex: 0,
                position: [ox + 70.0, oy + 40.0, 0.0],
            },
            "t09 first vertex on the x axis",
        ),
    ])
}

fn tile_10_triangles_geometry(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(10);
    let triangles = tree.create_geometry(root, GeometryKind::Triangles, Style::fill_only(GREEN))?;
    for p in [
        (10.0, 10.0),
        (40.0, 10.0),
        (10.0, 40.0),
        (40.0, 40.0),
        (70.0, 40.0),
        (40.0, 70.0),
    ] {
        tree.vertex(triangles, (ox + p.0, oy + p.1))?;
    }
    tree.end_shape(triangles, false)?;
    Ok(vec![
        GeometryExpectation::new(triangles, Check::Vertices(Stream::Fill, 6), "t10 vertices"),
        GeometryExpectation::new(triangles, Check::Indices(Stream::Fill, 6), "t10 indices"),
    ])
}

fn tile_11_textured_rect(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(11);
    let style = Style {
        texture: Some(CHECKERBOARD_TEXTURE_ID),
        ..Style::fill_only(Color::WHITE)
    };
    let rect = tree.create_primitive(
        root,
        Primitive::rect(ox + 10.0, oy + 10.0, 60.0, 60.0),
        style,
    )?;
    Ok(vec![GeometryExpectation::new(
        rect,
        Check::DrawCalls(Stream::Fill, 1),
        "t11 textured fill draws once",
    )])
}

fn tile_12_textured_with_stroke(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(12);
    let style = Style {
        texture: Some(CHECKERBOARD_TEXTURE_ID),
        stroke: Stroke::new(3.0, Color::BLACK),
        ..Style::default()
    };
    let rect = tree.create_primitive(
        root,
        Primitive::rect(ox + 10.0, oy + 10.0, 60.0, 60.0),
        style,
    )?;
    Ok(vec![GeometryExpectation::new(
        rect,
        Check::DrawCalls(Stream::Fill, 2),
        "t12 stroke splits from the textured fill",
    )])
}

fn tile_13_vertex_colors(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(13);
    let path = tree.create_path(root, Style::fill_only(Color::WHITE))?;
    tree.vertex(path, Vertex::new(ox + 10.0, oy + 70.0).with_color(RED))?;
    tree.vertex(path, Vertex::new(ox + 70.0, oy + 70.0).with_color(GREEN))?;
    tree.vertex(path, Vertex::new(ox + 40.0, oy + 10.0).with_color(BLUE))?;
    tree.end_shape(path, true)?;
    Ok(vec![
        GeometryExpectation::new(
            path,
            Check::FillColor {
                vertex: 1,
                rgba: GREEN.0,
            },
            "t13 green corner",
        ),
        GeometryExpectation::new(
            path,
            Check::FillColor {
                vertex: 2,
                rgba: BLUE.0,
            },
            "t13 blue corner",
        ),
    ])
}

fn tile_14_points(
    tree: &mut ShapeTree,
    root: NodeId,
) -> GeometryResult<Vec<GeometryExpectation>> {
    let (ox, oy) = tile_origin(14);
    let points = tree.create_geometry(
        root,
        GeometryKind::Points,
        Style::stroke_only(Stroke::new(10.0, RED)),
    )?;
    tree.vertex(points, (ox + 20.0, oy + 40.0))?;
    tree.vertex(points, (ox + 60.0, oy + 40.0))?;
    tree.end_shape(points, false)?;
    Ok(vec![
        GeometryExpectation::new(points, Check::MinVertices(Stream::Fill, 6), "t14 2d sprites"),
        GeometryExpectation::new(points, Check::Empty(Stream::Point), "t14 no 3d points"),
    ])
}

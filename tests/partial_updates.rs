/// In-place edits after tessellation and the buffer uploads they produce.
///
/// Run with:   cargo test --test partial_updates
use ahash::HashMap;
use tessera::{
    AttributeDecl, BufferKey, BufferTarget, Channel, Color, DrawCall, GeometryError,
    GeometryKind, LineCap, Material, NoTextures, NodeId, NodeState, ShapeTree, Stream, Stroke,
    Style, TessConfig, TextureId, TextureInfo, Transform,
};
use tessera_test_scenes::{DrawEvent, RecordingBackend, RecordingUploader};

fn square(tree: &mut ShapeTree, parent: NodeId, x: f32) -> NodeId {
    let path = tree.create_path(parent, Style::fill_only(Color::WHITE)).unwrap();
    for p in [(x, 0.0), (x + 10.0, 0.0), (x + 10.0, 10.0), (x, 10.0)] {
        tree.vertex(path, p).unwrap();
    }
    tree.end_shape(path, true).unwrap();
    path
}

/// Three squares under a group, tessellated and fully uploaded.
fn synced_tree(config: TessConfig) -> (ShapeTree, RecordingUploader, [NodeId; 3]) {
    let mut tree = ShapeTree::new(config).unwrap();
    let group = tree.create_group(tree.root()).unwrap();
    let ids = [
        square(&mut tree, group, 0.0),
        square(&mut tree, group, 20.0),
        square(&mut tree, group, 40.0),
    ];
    tree.update_tessellation(&NoTextures).unwrap();
    let mut uploader = RecordingUploader::default();
    tree.sync(&mut uploader);
    uploader.reset_log();
    (tree, uploader, ids)
}

fn styled_square(tree: &mut ShapeTree, x: f32, style: Style) -> NodeId {
    let path = tree.create_path(tree.root(), style).unwrap();
    for p in [(x, 0.0), (x + 10.0, 0.0), (x + 10.0, 10.0), (x, 10.0)] {
        tree.vertex(path, p).unwrap();
    }
    tree.end_shape(path, true).unwrap();
    path
}

fn key(stream: Stream, channel: Channel) -> BufferKey {
    BufferKey {
        stream,
        target: BufferTarget::Attribute(channel),
    }
}

#[test]
fn one_vertex_color_uploads_one_vertex() {
    let (mut tree, mut uploader, [_, middle, _]) = synced_tree(TessConfig::default());

    tree.set_vertex_color(middle, 1, Color::rgb(0, 0, 255)).unwrap();
    assert_eq!(tree.tracker().pending(), vec![(Stream::Fill, Channel::Color)]);
    let range = tree.tracker().range(Stream::Fill, Channel::Color).unwrap();
    assert_eq!(range.as_range(), 5..=5);

    let report = tree.sync(&mut uploader);
    assert_eq!(report.allocations, 0);
    assert_eq!(uploader.range_uploads, vec![(key(Stream::Fill, Channel::Color), 20..24)]);
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn edits_within_a_frame_coalesce_into_one_range() {
    let (mut tree, mut uploader, [first, _, last]) = synced_tree(TessConfig::default());

    tree.set_vertex_color(first, 0, Color::BLACK).unwrap();
    tree.set_vertex_color(last, 3, Color::BLACK).unwrap();
    tree.sync(&mut uploader);

    assert_eq!(uploader.range_uploads, vec![(key(Stream::Fill, Channel::Color), 0..48)]);
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn transforming_a_child_rewrites_only_its_positions() {
    let (mut tree, mut uploader, [_, middle, _]) = synced_tree(TessConfig::default());
    let blocks_before = tree.geometry().cache(Stream::Fill).blocks().to_vec();
    let indices_before = tree.geometry().indices(Stream::Fill).to_vec();

    tree.apply_transform(middle, &Transform::translation(0.0, 5.0, 0.0))
        .unwrap();
    assert!(!tree.needs_tessellation());
    assert_eq!(tree.geometry().cache(Stream::Fill).blocks(), blocks_before.as_slice());
    assert_eq!(tree.geometry().indices(Stream::Fill), indices_before.as_slice());
    assert_eq!(tree.geometry().fill.attributes.positions[4], [20.0, 5.0, 0.0]);
    assert_eq!(tree.geometry().fill.attributes.positions[0], [0.0, 0.0, 0.0]);

    tree.sync(&mut uploader);
    assert!(uploader
        .range_uploads
        .contains(&(key(Stream::Fill, Channel::Position), 48..96)));
    assert!(uploader
        .range_uploads
        .iter()
        .all(|(key, _)| key.target != BufferTarget::Index));
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn transforming_a_group_moves_every_descendant() {
    let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    let outer = tree.create_group(tree.root()).unwrap();
    tree.apply_transform(outer, &Transform::scale(2.0, 2.0, 1.0))
        .unwrap();
    let a = square(&mut tree, outer, 0.0);
    tree.update_tessellation(&NoTextures).unwrap();
    assert_eq!(tree.geometry().fill.attributes.positions[2], [20.0, 20.0, 0.0]);

    // Applied in the child's frame, which the group then scales.
    tree.apply_transform(a, &Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    assert_eq!(tree.geometry().fill.attributes.positions[2], [22.0, 20.0, 0.0]);

    tree.apply_transform(outer, &Transform::translation(100.0, 0.0, 0.0))
        .unwrap();
    assert_eq!(tree.geometry().fill.attributes.positions[2], [122.0, 20.0, 0.0]);
    assert!(!tree.needs_tessellation());

    // The fast path agrees with a full re-tessellation.
    let fast = tree.geometry().fill.attributes.positions.clone();
    tree.mark_dirty(a, tessera::DirtyReason::Vertices).unwrap();
    tree.update_tessellation(&NoTextures).unwrap();
    for (p, q) in fast.iter().zip(&tree.geometry().fill.attributes.positions) {
        assert!(p.iter().zip(q).all(|(a, b)| (a - b).abs() < 1e-3));
    }
}

#[test]
fn singular_parents_fall_back_to_tessellation() {
    let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    let flat = tree.create_group(tree.root()).unwrap();
    tree.apply_transform(flat, &Transform::scale(1.0, 0.0, 1.0))
        .unwrap();
    let a = square(&mut tree, flat, 0.0);
    tree.update_tessellation(&NoTextures).unwrap();

    tree.apply_transform(a, &Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    assert!(tree.needs_tessellation());
}

#[test]
fn group_fill_color_recolors_every_descendant_in_place() {
    let (mut tree, mut uploader, [first, ..]) = synced_tree(TessConfig::default());
    let group = tree.parent(first).unwrap().unwrap();

    tree.set_fill_color(group, Color::rgb(10, 20, 30)).unwrap();
    assert!(!tree.needs_tessellation());
    assert!(tree
        .geometry()
        .fill
        .attributes
        .colors
        .iter()
        .all(|c| *c == [10, 20, 30, 255]));

    tree.sync(&mut uploader);
    assert_eq!(uploader.range_uploads, vec![(key(Stream::Fill, Channel::Color), 0..48)]);
}

#[test]
fn material_edits_touch_the_four_material_channels() {
    let (mut tree, mut uploader, [_, middle, _]) = synced_tree(TessConfig::default());
    let material = Material {
        shininess: 8.0,
        ..Material::default()
    };

    tree.set_material(middle, material).unwrap();
    assert_eq!(
        tree.tracker().pending(),
        vec![
            (Stream::Fill, Channel::Ambient),
            (Stream::Fill, Channel::Specular),
            (Stream::Fill, Channel::Emissive),
            (Stream::Fill, Channel::Shininess),
        ]
    );
    tree.sync(&mut uploader);
    assert_eq!(uploader.range_uploads.len(), 4);
    assert_eq!(tree.geometry().fill.attributes.shininess[4..8], [8.0; 4]);
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn toggling_the_stroke_requires_a_full_upload() {
    let (mut tree, mut uploader, [first, ..]) = synced_tree(TessConfig::default());

    tree.set_stroke_enabled(first, true).unwrap();
    assert!(tree.needs_tessellation());
    tree.update_tessellation(&NoTextures).unwrap();

    let report = tree.sync(&mut uploader);
    assert!(report.allocations > 0);
    assert_eq!(report.range_uploads, 0);
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn removing_a_child_shrinks_the_geometry() {
    let (mut tree, mut uploader, [first, middle, last]) = synced_tree(TessConfig::default());
    let group = tree.parent(first).unwrap().unwrap();

    tree.remove(middle).unwrap();
    tree.update_tessellation(&NoTextures).unwrap();
    tree.sync(&mut uploader);

    assert_eq!(tree.geometry().vertex_count(Stream::Fill), 8);
    assert_eq!(tree.children(group).unwrap(), vec![first, last]);
    assert_eq!(
        tree.ranges(last).unwrap().vertices(Stream::Fill).map(|s| s.first),
        Some(4)
    );
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn three_d_stroke_weight_rescales_line_directions() {
    let mut tree = ShapeTree::new(TessConfig::three_d()).unwrap();
    let line = tree
        .create_geometry(
            tree.root(),
            GeometryKind::LineStrip,
            Style::stroke_only(Stroke::new(2.0, Color::BLACK)),
        )
        .unwrap();
    for p in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)] {
        tree.vertex(line, p).unwrap();
    }
    tree.end_shape(line, false).unwrap();
    tree.update_tessellation(&NoTextures).unwrap();
    let mut uploader = RecordingUploader::default();
    tree.sync(&mut uploader);
    uploader.reset_log();

    tree.set_stroke_weight(line, 6.0).unwrap();
    assert!(!tree.needs_tessellation());
    assert_eq!(
        tree.tracker().pending(),
        vec![(Stream::Line, Channel::Direction)]
    );
    assert_eq!(tree.geometry().line.attributes.directions[0][3], 3.0);

    tree.sync(&mut uploader);
    assert_eq!(uploader.range_uploads, vec![(key(Stream::Line, Channel::Direction), 0..128)]);
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn draw_issues_one_call_per_block() {
    let (tree, _, _) = synced_tree(TessConfig::default());
    let mut backend = RecordingBackend::default();

    assert_eq!(tree.draw(tree.root(), &mut backend), Ok(1));
    assert_eq!(
        backend.events,
        vec![
            DrawEvent::Bind(None),
            DrawEvent::Draw(
                Stream::Fill,
                DrawCall {
                    vertex_offset: 0,
                    index_offset: 0,
                    index_count: 18
                }
            ),
        ]
    );
}

#[test]
fn concave_paths_recolor_one_vertex_in_place() {
    let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    let path = tree
        .create_path(tree.root(), Style::fill_only(Color::rgb(255, 0, 0)))
        .unwrap();
    for p in [(0.0, 0.0), (10.0, 0.0), (5.0, 3.0), (10.0, 10.0), (0.0, 10.0)] {
        tree.vertex(path, p).unwrap();
    }
    tree.end_shape(path, true).unwrap();
    tree.update_tessellation(&NoTextures).unwrap();
    assert_eq!(tree.metrics().general_fills, 1);
    assert!(tree
        .geometry()
        .fill
        .attributes
        .colors
        .iter()
        .all(|c| *c == [255, 0, 0, 255]));

    tree.set_vertex_color(path, 2, Color::rgb(0, 0, 255)).unwrap();
    assert!(!tree.needs_tessellation());
    assert_eq!(tree.tracker().pending(), vec![(Stream::Fill, Channel::Color)]);
    let range = tree.tracker().range(Stream::Fill, Channel::Color).unwrap();
    assert_eq!(range.first, range.last);
    assert_eq!(tree.geometry().fill.attributes.colors[range.first], [0, 0, 255, 255]);
}

#[test]
fn failed_passes_keep_the_previous_geometry_editable() {
    let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    let textured = styled_square(&mut tree, 0.0, Style::fill_only(Color::WHITE));
    let plain = styled_square(&mut tree, 20.0, Style::fill_only(Color::WHITE));
    tree.update_tessellation(&NoTextures).unwrap();
    let before = tree.geometry().clone();

    let mut textures = HashMap::default();
    textures.insert(TextureId(9), TextureInfo::new(100_000, 16));
    tree.set_texture(textured, Some(TextureId(9))).unwrap();
    assert!(matches!(
        tree.update_tessellation(&textures),
        Err(GeometryError::TextureTooLarge { .. })
    ));
    assert_eq!(tree.geometry(), &before);
    assert_eq!(tree.state(plain), Ok(NodeState::Tessellated));

    tree.set_fill_color(plain, Color::rgb(0, 0, 255)).unwrap();
    tree.set_vertex_color(plain, 0, Color::BLACK).unwrap();
    tree.apply_transform(plain, &Transform::translation(0.0, 1.0, 0.0))
        .unwrap();
    let fill = &tree.geometry().fill.attributes;
    assert_eq!(fill.colors[4], [0, 0, 0, 255]);
    assert_eq!(fill.colors[5], [0, 0, 255, 255]);
    assert_eq!(fill.positions[4], [20.0, 1.0, 0.0]);

    tree.set_texture(textured, None).unwrap();
    assert_eq!(tree.update_tessellation(&textures), Ok(true));
    assert_eq!(tree.geometry().vertex_count(Stream::Fill), 8);
}

#[test]
fn attributes_declared_after_tessellation_are_editable_in_place() {
    let (mut tree, mut uploader, [_, middle, _]) = synced_tree(TessConfig::default());

    let heat = tree.declare_attribute("heat", AttributeDecl::float(1)).unwrap();
    tree.set_vertex_attribute(middle, 1, "heat", &[1.0]).unwrap();
    let channel = tree.geometry().fill.attributes.custom_channel(heat).unwrap();
    assert_eq!(channel.values.len(), 12);
    assert_eq!(channel.values[5], 1.0);

    tree.update_tessellation(&NoTextures).unwrap();
    let channel = tree.geometry().fill.attributes.custom_channel(heat).unwrap();
    assert_eq!(channel.values.len(), 12);
    assert_eq!(channel.values[5], 1.0);
    assert_eq!(channel.values.iter().filter(|v| **v != 0.0).count(), 1);

    tree.sync(&mut uploader);
    assert!(uploader.mismatches(&tree).is_empty());
}

#[test]
fn tint_recolors_textured_fills_only() {
    let mut textures = HashMap::default();
    textures.insert(TextureId(3), TextureInfo::new(32, 32));
    let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    let style = Style {
        texture: Some(TextureId(3)),
        ..Style::fill_only(Color::rgb(0, 255, 0))
    };
    let textured = styled_square(&mut tree, 0.0, style);
    let plain = styled_square(&mut tree, 20.0, Style::fill_only(Color::WHITE));
    tree.update_tessellation(&textures).unwrap();
    let colors = |tree: &ShapeTree| tree.geometry().fill.attributes.colors.clone();
    assert!(colors(&tree)[..4].iter().all(|c| *c == [255, 255, 255, 255]));

    let red = Color::rgb(255, 0, 0);
    tree.set_tint(tree.root(), Some(red)).unwrap();
    tree.set_fill_color(tree.root(), Color::rgb(0, 0, 255)).unwrap();
    assert!(!tree.needs_tessellation());
    let in_place = colors(&tree);
    assert!(in_place[..4].iter().all(|c| *c == red.to_array()));
    assert!(in_place[4..].iter().all(|c| *c == [0, 0, 255, 255]));

    tree.set_vertex_position(textured, 0, [0.0, 0.0, 0.0]).unwrap();
    tree.set_vertex_position(plain, 0, [20.0, 0.0, 0.0]).unwrap();
    assert_eq!(tree.update_tessellation(&textures), Ok(true));
    assert_eq!(colors(&tree), in_place);
}

#[test]
fn round_point_sprites_retessellate_when_their_outline_changes() {
    let mut tree = ShapeTree::new(TessConfig::three_d()).unwrap();
    let stroke = Stroke::new(2.0, Color::BLACK).with_cap(LineCap::Round);
    let points = tree
        .create_geometry(tree.root(), GeometryKind::Points, Style::stroke_only(stroke))
        .unwrap();
    for p in [(0.0, 0.0), (10.0, 0.0)] {
        tree.vertex(points, p).unwrap();
    }
    tree.end_shape(points, false).unwrap();
    tree.update_tessellation(&NoTextures).unwrap();
    let sprite_vertices = tree.geometry().vertex_count(Stream::Point);

    // Same segment count, so the offsets are rescaled in place.
    tree.set_stroke_weight(points, 2.2).unwrap();
    assert!(!tree.needs_tessellation());
    assert_eq!(
        tree.tracker().pending(),
        vec![(Stream::Point, Channel::Offset)]
    );

    tree.set_stroke_weight(points, 8.0).unwrap();
    assert!(tree.needs_tessellation());
    tree.update_tessellation(&NoTextures).unwrap();
    assert!(tree.geometry().vertex_count(Stream::Point) > sprite_vertices);
}

//! The `shape` module holds the retained shape tree: groups, geometry, paths and primitives,
//! their styles and transforms, and the single tessellated geometry the whole tree shares.
//!
//! # Examples
//!
//! Building a tree, tessellating it and editing it in place:
//!
//! ```rust
//! use tessera::{Color, NoTextures, ShapeTree, Stream, Style, TessConfig};
//!
//! let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
//! let root = tree.root();
//!
//! // A red square path
//! let square = tree.create_path(root, Style::fill_only(Color::rgb(255, 0, 0))).unwrap();
//! for p in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
//!     tree.vertex(square, p).unwrap();
//! }
//! tree.end_shape(square, true).unwrap();
//!
//! tree.update_tessellation(&NoTextures).unwrap();
//! assert_eq!(tree.geometry().vertex_count(Stream::Fill), 4);
//!
//! // Color edits do not re-tessellate
//! tree.set_fill_color(square, Color::rgb(0, 0, 255)).unwrap();
//! assert!(!tree.needs_tessellation());
//! ```

use easy_tree::Tree;
use smallvec::SmallVec;

use crate::aggregate::{Aggregator, NodeRanges};
use crate::color::Color;
use crate::config::TessConfig;
use crate::dirty::{Channel, DirtyTracker, Stream};
use crate::error::{GeometryError, GeometryResult};
use crate::id::{NodeId, TextureId};
use crate::index_cache::VertexSpan;
use crate::input::{AttributeDecl, InputGeometry, Vertex, VertexAttrs, VertexCode, VertexRecord};
use crate::metrics::TessMetrics;
use crate::output::{CustomChannel, TessGeometry};
use crate::primitive::{self, Primitive};
use crate::stroke::{LineCap, LineJoin};
use crate::style::{FillRule, Material, Style, TextureMode};
use crate::sync::{TextureInfo, TextureProvider};
use crate::tessellator::{
    sprite_outline_count, texture_coordinate, GeometryKind, LeafOutput, LeafShape, StrokePath,
    Tessellator,
};
use crate::transform::Transform;

/// What a node is and where its input geometry comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Family {
    /// Holds children only.
    Group,
    /// Vertices authored one by one, connected according to a [`GeometryKind`].
    Geometry,
    /// Input geometry regenerated from a primitive description at every tessellation.
    Primitive(Primitive),
    /// A polygon loaded from points and vertex codes.
    Path,
}

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Accepting vertices.
    Open,
    /// Finalized, waiting for the next tessellation.
    Untessellated,
    /// Has valid ranges in the output geometry.
    Tessellated,
}

/// Why a node was sent back to [`NodeState::Untessellated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyReason {
    /// A child was added or removed.
    Structure,
    /// Raw vertex data changed.
    Vertices,
    FillToggled,
    StrokeToggled,
    /// Stroke weight, cap or join changed in a way the output cannot follow in place.
    StrokeStyle,
    Texture,
    FillRule,
    /// A transform changed while the node had no output geometry.
    Transform,
    /// The custom attribute layout changed.
    Attributes,
}

#[derive(Debug, Clone)]
pub(crate) struct ShapeNode {
    pub(crate) family: Family,
    pub(crate) kind: GeometryKind,
    pub(crate) style: Style,
    /// Local transform, applied before the parent's.
    pub(crate) transform: Transform,
    pub(crate) input: InputGeometry,
    pub(crate) closed: bool,
    pub(crate) convex: bool,
    pub(crate) normalized_uv: bool,
    pub(crate) stroke_override: Option<Vec<StrokePath>>,
    pub(crate) state: NodeState,
    pub(crate) ranges: NodeRanges,
    pub(crate) leaf: Option<LeafOutput>,
    pub(crate) texture: Option<TextureInfo>,
    /// Some leaf of the subtree binds a texture.
    pub(crate) textured: bool,
    current_normal: [f32; 3],
}

impl ShapeNode {
    fn new(family: Family, kind: GeometryKind, style: Style, state: NodeState) -> Self {
        Self {
            family,
            kind,
            style,
            transform: Transform::identity(),
            input: InputGeometry::new(),
            closed: false,
            convex: false,
            normalized_uv: false,
            stroke_override: None,
            state,
            ranges: NodeRanges::default(),
            leaf: None,
            texture: None,
            textured: false,
            current_normal: [0.0, 0.0, 1.0],
        }
    }

    #[inline]
    pub(crate) fn is_group(&self) -> bool {
        self.family == Family::Group
    }

    fn record(&self, vertex: &Vertex) -> VertexRecord {
        VertexRecord {
            position: vertex.position,
            attrs: VertexAttrs {
                color: vertex.color.unwrap_or(self.style.fill_color),
                normal: vertex.normal.unwrap_or(self.current_normal),
                tex_coord: vertex.tex_coord.unwrap_or([0.0, 0.0]),
                material: self.style.material,
            },
        }
    }

    fn image_mode(&self) -> bool {
        self.style.texture_mode == TextureMode::Image && !self.normalized_uv
    }

    /// Output of the last tessellation when the node still has valid ranges.
    fn live_output(&self) -> Option<&LeafOutput> {
        match self.state {
            NodeState::Tessellated => self.leaf.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RegisteredAttribute {
    name: String,
    decl: AttributeDecl,
}

/// A shape tree with a single root group owning the tessellated geometry of every descendant.
pub struct ShapeTree {
    tree: Tree<ShapeNode>,
    root: NodeId,
    config: TessConfig,
    tessellator: Tessellator,
    pub(crate) geometry: TessGeometry,
    pub(crate) tracker: DirtyTracker,
    attributes: Vec<RegisteredAttribute>,
    needs_tessellation: bool,
}

impl ShapeTree {
    /// Creates a tree holding only its root group.
    pub fn new(config: TessConfig) -> GeometryResult<Self> {
        config.validate()?;
        let mut tree = Tree::new();
        let root = tree.add_node(ShapeNode::new(
            Family::Group,
            GeometryKind::Polygon,
            Style::default(),
            NodeState::Untessellated,
        ));
        Ok(Self {
            tree,
            root: NodeId(root),
            config,
            tessellator: Tessellator::new(config),
            geometry: TessGeometry::new(),
            tracker: DirtyTracker::new(),
            attributes: Vec::new(),
            needs_tessellation: true,
        })
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn config(&self) -> &TessConfig {
        &self.config
    }

    #[inline]
    pub fn geometry(&self) -> &TessGeometry {
        &self.geometry
    }

    #[inline]
    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    /// Counters of the last tessellation pass.
    #[inline]
    pub fn metrics(&self) -> &TessMetrics {
        self.tessellator.metrics()
    }

    /// True when some node changed in a way only a full tessellation can reflect.
    #[inline]
    pub fn needs_tessellation(&self) -> bool {
        self.needs_tessellation
    }

    pub(crate) fn node(&self, id: NodeId) -> GeometryResult<&ShapeNode> {
        self.tree
            .get(id.index())
            .ok_or(GeometryError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> GeometryResult<&mut ShapeNode> {
        self.tree
            .get_mut(id.index())
            .ok_or(GeometryError::NodeNotFound(id))
    }

    /// A non-group node.
    fn leaf_mut(&mut self, id: NodeId) -> GeometryResult<&mut ShapeNode> {
        let node = self.node_mut(id)?;
        if node.is_group() {
            return Err(GeometryError::NotGeometry(id));
        }
        Ok(node)
    }

    /// A non-group node that is accepting vertices.
    fn open_mut(&mut self, id: NodeId) -> GeometryResult<&mut ShapeNode> {
        let node = self.leaf_mut(id)?;
        if node.state != NodeState::Open {
            return Err(GeometryError::ShapeNotOpen(id));
        }
        Ok(node)
    }

    fn curve_target(&mut self, id: NodeId) -> GeometryResult<&mut ShapeNode> {
        let node = self.open_mut(id)?;
        if !node.kind.supports_curves() {
            return Err(GeometryError::CurveNotSupported(id));
        }
        Ok(node)
    }

    pub fn state(&self, id: NodeId) -> GeometryResult<NodeState> {
        Ok(self.node(id)?.state)
    }

    pub fn family(&self, id: NodeId) -> GeometryResult<Family> {
        Ok(self.node(id)?.family)
    }

    pub fn kind(&self, id: NodeId) -> GeometryResult<GeometryKind> {
        Ok(self.node(id)?.kind)
    }

    pub fn style(&self, id: NodeId) -> GeometryResult<&Style> {
        Ok(&self.node(id)?.style)
    }

    pub fn transform(&self, id: NodeId) -> GeometryResult<Transform> {
        Ok(self.node(id)?.transform)
    }

    pub fn input(&self, id: NodeId) -> GeometryResult<&InputGeometry> {
        Ok(&self.node(id)?.input)
    }

    /// Vertex and block ranges of the node from the last tessellation.
    pub fn ranges(&self, id: NodeId) -> GeometryResult<NodeRanges> {
        Ok(self.node(id)?.ranges)
    }

    pub fn parent(&self, id: NodeId) -> GeometryResult<Option<NodeId>> {
        self.node(id)?;
        Ok(self.tree.parent_index_unchecked(id.index()).map(NodeId))
    }

    /// Number of nodes in the tree, root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> GeometryResult<Vec<NodeId>> {
        self.node(id)?;
        Ok(self.live_children(id.index()).map(NodeId).collect())
    }

    fn live_children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.tree.children(index).iter().copied()
    }

    /// The node and its live descendants in pre-order.
    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id.index()];
        while let Some(index) = stack.pop() {
            out.push(NodeId(index));
            let children: SmallVec<[usize; 8]> = self.live_children(index).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Non-group nodes of the subtree in pre-order.
    fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.subtree(id)
            .into_iter()
            .filter(|&n| self.tree.get(n.index()).is_some_and(|node| !node.is_group()))
            .collect()
    }

    /// Sends the node and its ancestors back to [`NodeState::Untessellated`].
    ///
    /// This is the only place tessellation state is invalidated; every setter that cannot update
    /// the output in place goes through it.
    pub fn mark_dirty(&mut self, id: NodeId, reason: DirtyReason) -> GeometryResult<()> {
        self.node(id)?;
        tracing::trace!(node = %id, ?reason, "shape needs tessellation");
        let mut current = Some(id.index());
        while let Some(index) = current {
            if let Some(node) = self.tree.get_mut(index) {
                if node.state == NodeState::Tessellated {
                    node.state = NodeState::Untessellated;
                }
            }
            current = self.tree.parent_index_unchecked(index);
        }
        self.needs_tessellation = true;
        Ok(())
    }

    // Structure

    fn attach(&mut self, parent: NodeId, node: ShapeNode) -> GeometryResult<NodeId> {
        if !self.node(parent)?.is_group() {
            return Err(GeometryError::NotGroup(parent));
        }
        let id = NodeId(self.tree.add_child(parent.index(), node));
        self.mark_dirty(parent, DirtyReason::Structure)?;
        Ok(id)
    }

    pub fn create_group(&mut self, parent: NodeId) -> GeometryResult<NodeId> {
        let style = self.node(parent)?.style;
        self.attach(
            parent,
            ShapeNode::new(
                Family::Group,
                GeometryKind::Polygon,
                style,
                NodeState::Untessellated,
            ),
        )
    }

    /// Creates an open geometry node whose vertices connect according to `kind`.
    pub fn create_geometry(
        &mut self,
        parent: NodeId,
        kind: GeometryKind,
        style: Style,
    ) -> GeometryResult<NodeId> {
        self.attach(
            parent,
            ShapeNode::new(Family::Geometry, kind, style, NodeState::Open),
        )
    }

    /// Creates an open polygon path.
    pub fn create_path(&mut self, parent: NodeId, style: Style) -> GeometryResult<NodeId> {
        self.attach(
            parent,
            ShapeNode::new(Family::Path, GeometryKind::Polygon, style, NodeState::Open),
        )
    }

    /// Creates a primitive. Primitives are never open.
    ///
    /// ```
    /// use tessera::{NoTextures, Primitive, ShapeTree, Stream, Style, TessConfig};
    ///
    /// let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    /// let ellipse = tree
    ///     .create_primitive(tree.root(), Primitive::ellipse(50.0, 50.0, 20.0, 10.0), Style::default())
    ///     .unwrap();
    /// tree.update_tessellation(&NoTextures).unwrap();
    /// assert_eq!(tree.metrics().convex_fills, 1);
    /// assert!(tree.ranges(ellipse).unwrap().vertices(Stream::Fill).is_some());
    /// ```
    pub fn create_primitive(
        &mut self,
        parent: NodeId,
        primitive: Primitive,
        style: Style,
    ) -> GeometryResult<NodeId> {
        let mut node = ShapeNode::new(
            Family::Primitive(primitive),
            GeometryKind::Polygon,
            style,
            NodeState::Untessellated,
        );
        node.closed = true;
        self.attach(parent, node)
    }

    /// Detaches a node and its subtree and frees their slots.
    ///
    /// The ids report `NodeNotFound` until a later `create_*` call reuses the slot.
    pub fn remove(&mut self, id: NodeId) -> GeometryResult<()> {
        if id == self.root {
            return Err(GeometryError::RootRemoval);
        }
        let parent = self.parent(id)?;
        self.tree.remove_subtree(id.index());
        if let Some(parent) = parent {
            self.mark_dirty(parent, DirtyReason::Structure)?;
        }
        Ok(())
    }

    // Vertex input

    pub fn vertex(&mut self, id: NodeId, vertex: impl Into<Vertex>) -> GeometryResult<()> {
        let vertex = vertex.into();
        let node = self.open_mut(id)?;
        let record = node.record(&vertex);
        node.input.push_vertex(record);
        Ok(())
    }

    pub fn quadratic_vertex(
        &mut self,
        id: NodeId,
        ctrl: impl Into<Vertex>,
        to: impl Into<Vertex>,
    ) -> GeometryResult<()> {
        let (ctrl, to) = (ctrl.into(), to.into());
        let node = self.curve_target(id)?;
        let (ctrl, to) = (node.record(&ctrl), node.record(&to));
        node.input.push_quadratic(ctrl, to)
    }

    pub fn bezier_vertex(
        &mut self,
        id: NodeId,
        ctrl1: impl Into<Vertex>,
        ctrl2: impl Into<Vertex>,
        to: impl Into<Vertex>,
    ) -> GeometryResult<()> {
        let (ctrl1, ctrl2, to) = (ctrl1.into(), ctrl2.into(), to.into());
        let node = self.curve_target(id)?;
        let (ctrl1, ctrl2, to) = (node.record(&ctrl1), node.record(&ctrl2), node.record(&to));
        node.input.push_cubic(ctrl1, ctrl2, to)
    }

    pub fn curve_vertex(&mut self, id: NodeId, vertex: impl Into<Vertex>) -> GeometryResult<()> {
        let vertex = vertex.into();
        let node = self.curve_target(id)?;
        let record = node.record(&vertex);
        node.input.push_curve_vertex(record);
        Ok(())
    }

    /// Starts a new contour. In a filled polygon, later contours can cut holes.
    pub fn break_contour(&mut self, id: NodeId) -> GeometryResult<()> {
        self.open_mut(id)?.input.push_break();
        Ok(())
    }

    /// Normal used by vertices appended without one.
    pub fn normal(&mut self, id: NodeId, normal: [f32; 3]) -> GeometryResult<()> {
        self.open_mut(id)?.current_normal = normal;
        Ok(())
    }

    /// Sets the value of a declared custom attribute for vertices appended from now on.
    pub fn attribute(&mut self, id: NodeId, name: &str, values: &[f32]) -> GeometryResult<()> {
        let (attribute, _) = self.resolve_attribute(name, values.len())?;
        self.open_mut(id)?
            .input
            .set_custom_current(attribute, values);
        Ok(())
    }

    /// Finalizes an open node.
    pub fn end_shape(&mut self, id: NodeId, close: bool) -> GeometryResult<()> {
        let node = self.open_mut(id)?;
        node.closed = close;
        node.state = NodeState::Untessellated;
        self.mark_dirty(id, DirtyReason::Vertices)
    }

    /// Replaces the input of a path from a flat point list and vertex codes.
    ///
    /// The codes are validated before anything changes, so a malformed stream leaves the path
    /// untouched.
    pub fn set_path(
        &mut self,
        id: NodeId,
        points: &[[f32; 3]],
        codes: &[VertexCode],
        close: bool,
    ) -> GeometryResult<()> {
        let node = self.leaf_mut(id)?;
        if !node.kind.supports_curves() || matches!(node.family, Family::Primitive(_)) {
            return Err(GeometryError::CurveNotSupported(id));
        }
        let attrs = node.record(&Vertex::default()).attrs;
        node.input = InputGeometry::from_codes(points, codes, attrs)?;
        node.closed = close;
        node.state = NodeState::Untessellated;
        self.mark_dirty(id, DirtyReason::Vertices)
    }

    // Custom attributes

    /// Declares a custom per-vertex attribute for the whole tree and returns its id.
    ///
    /// Declaring the same name again is allowed only with the same kind and component count.
    pub fn declare_attribute(&mut self, name: &str, decl: AttributeDecl) -> GeometryResult<u16> {
        if let Some(pos) = self.attributes.iter().position(|a| a.name == name) {
            let existing = self.attributes[pos].decl;
            if existing != decl {
                return Err(GeometryError::AttributeMismatch {
                    name: name.to_string(),
                    expected: (existing.kind, existing.components),
                    found: (decl.kind, decl.components),
                });
            }
            return Ok(pos as u16);
        }
        if !(1..=4).contains(&decl.components) {
            return Err(GeometryError::AttributeArity {
                name: name.to_string(),
                expected: 4,
                found: decl.components as usize,
            });
        }
        if self.attributes.len() >= u16::MAX as usize {
            return Err(GeometryError::CapacityExceeded {
                what: "custom attributes",
                requested: self.attributes.len() + 1,
                limit: u16::MAX as usize,
            });
        }

        let id = self.attributes.len() as u16;
        self.attributes.push(RegisteredAttribute {
            name: name.to_string(),
            decl,
        });
        // Zero-filled so that shapes tessellated before the declaration stay editable in place.
        let values = vec![0.0; self.geometry.fill.vertex_count() * decl.components as usize];
        self.geometry.fill.attributes.custom.push(CustomChannel {
            id,
            name: name.to_string(),
            decl,
            values,
        });
        self.tracker.mark_full_upload();
        self.mark_dirty(self.root, DirtyReason::Attributes)?;
        Ok(id)
    }

    pub fn attribute_id(&self, name: &str) -> Option<u16> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .map(|pos| pos as u16)
    }

    fn resolve_attribute(&self, name: &str, len: usize) -> GeometryResult<(u16, usize)> {
        let id = self
            .attribute_id(name)
            .ok_or_else(|| GeometryError::UnknownAttribute(name.to_string()))?;
        let components = self.attributes[id as usize].decl.components as usize;
        if len != components {
            return Err(GeometryError::AttributeArity {
                name: name.to_string(),
                expected: components,
                found: len,
            });
        }
        Ok((id, components))
    }

    // Per-vertex edits

    /// Updates input vertex `index` with `edit` and mirrors it onto the output vertices that
    /// copy it, marking exactly those vertices dirty in `channels`.
    ///
    /// Falls back to invalidating the node when its fill contains interpolated vertices.
    fn edit_vertex(
        &mut self,
        id: NodeId,
        index: usize,
        channels: &[Channel],
        edit: impl FnOnce(&mut ShapeNode),
        mirror: impl Fn(&ShapeNode, &mut TessGeometry, usize),
    ) -> GeometryResult<()> {
        let node = self.leaf_mut(id)?;
        let len = node.input.len();
        if index >= len {
            return Err(GeometryError::VertexOutOfRange {
                node: id,
                index,
                len,
            });
        }
        edit(node);

        let node = self
            .tree
            .get(id.index())
            .ok_or(GeometryError::NodeNotFound(id))?;
        if node.state == NodeState::Open {
            return Ok(());
        }
        let in_step = channels
            .iter()
            .all(|&channel| self.geometry.channel_in_step(Stream::Fill, channel));
        match node.live_output().filter(|leaf| leaf.exact_map && in_step) {
            Some(leaf) => {
                for &out in &leaf.tess_map[index] {
                    mirror(node, &mut self.geometry, out);
                    for &channel in channels {
                        self.tracker.mark_modified(Stream::Fill, channel, out, out);
                    }
                }
                Ok(())
            }
            None => self.mark_dirty(id, DirtyReason::Vertices),
        }
    }

    /// Moving a vertex always re-tessellates.
    pub fn set_vertex_position(
        &mut self,
        id: NodeId,
        index: usize,
        position: [f32; 3],
    ) -> GeometryResult<()> {
        let node = self.leaf_mut(id)?;
        let len = node.input.len();
        let record = node
            .input
            .vertices
            .get_mut(index)
            .ok_or(GeometryError::VertexOutOfRange {
                node: id,
                index,
                len,
            })?;
        record.position = position;
        if node.state != NodeState::Open {
            self.mark_dirty(id, DirtyReason::Vertices)?;
        }
        Ok(())
    }

    /// Changes the fill color of one vertex.
    ///
    /// Primitives regenerate their vertices at the next tessellation, which discards
    /// per-vertex edits made to them.
    pub fn set_vertex_color(&mut self, id: NodeId, index: usize, color: Color) -> GeometryResult<()> {
        self.edit_vertex(
            id,
            index,
            &[Channel::Color],
            |node| node.input.vertices[index].attrs.color = color,
            |node, geometry, out| {
                // Textured fills keep their tint.
                if node.texture.is_none() {
                    geometry.fill.attributes.colors[out] = color.to_array();
                }
            },
        )
    }

    pub fn set_vertex_normal(
        &mut self,
        id: NodeId,
        index: usize,
        normal: [f32; 3],
    ) -> GeometryResult<()> {
        self.edit_vertex(
            id,
            index,
            &[Channel::Normal],
            |node| node.input.vertices[index].attrs.normal = normal,
            |_, geometry, out| geometry.fill.attributes.normals[out] = normal,
        )
    }

    pub fn set_vertex_uv(&mut self, id: NodeId, index: usize, u: f32, v: f32) -> GeometryResult<()> {
        self.edit_vertex(
            id,
            index,
            &[Channel::TexCoord],
            |node| node.input.vertices[index].attrs.tex_coord = [u, v],
            |node, geometry, out| {
                geometry.fill.attributes.tex_coords[out] =
                    texture_coordinate(node.texture, node.image_mode(), [u, v]);
            },
        )
    }

    pub fn set_vertex_material(
        &mut self,
        id: NodeId,
        index: usize,
        material: Material,
    ) -> GeometryResult<()> {
        self.edit_vertex(
            id,
            index,
            &MATERIAL_CHANNELS,
            |node| node.input.vertices[index].attrs.material = material,
            |_, geometry, out| write_material(geometry, out, &material),
        )
    }

    pub fn set_vertex_attribute(
        &mut self,
        id: NodeId,
        index: usize,
        name: &str,
        values: &[f32],
    ) -> GeometryResult<()> {
        let (attribute, components) = self.resolve_attribute(name, values.len())?;
        self.edit_vertex(
            id,
            index,
            &[Channel::Custom(attribute)],
            |node| node.input.set_custom_value(attribute, index, values),
            |_, geometry, out| {
                let start = out * components;
                if let Some(slot) = geometry
                    .fill
                    .attributes
                    .custom_channel_mut(attribute)
                    .and_then(|channel| channel.values.get_mut(start..start + components))
                {
                    slot.copy_from_slice(values);
                }
            },
        )
    }

    // Whole-shape style

    /// Applies `f` to the style of every node in the subtree, returning the leaves it touched.
    fn restyle(&mut self, id: NodeId, f: impl Fn(&mut Style)) -> GeometryResult<Vec<NodeId>> {
        self.node(id)?;
        let mut leaves = Vec::new();
        for n in self.subtree(id) {
            if let Some(node) = self.tree.get_mut(n.index()) {
                f(&mut node.style);
                if !node.is_group() {
                    leaves.push(n);
                }
            }
        }
        Ok(leaves)
    }

    /// Invalidates every leaf in `leaves` for which `affected` holds.
    fn invalidate_where(
        &mut self,
        leaves: &[NodeId],
        reason: DirtyReason,
        affected: impl Fn(&ShapeNode) -> bool,
    ) -> GeometryResult<()> {
        for &leaf in leaves {
            let node = self.node(leaf)?;
            if node.state == NodeState::Open {
                tracing::warn!(node = %leaf, ?reason, "style changed on an open shape");
                continue;
            }
            if affected(node) {
                self.mark_dirty(leaf, reason)?;
            }
        }
        Ok(())
    }

    pub fn set_fill_enabled(&mut self, id: NodeId, enabled: bool) -> GeometryResult<()> {
        let changed: Vec<NodeId> = self
            .leaves(id)
            .into_iter()
            .filter(|n| self.tree.get(n.index()).is_some_and(|node| node.style.fill != enabled))
            .collect();
        self.restyle(id, |style| style.fill = enabled)?;
        self.invalidate_where(&changed, DirtyReason::FillToggled, |_| true)
    }

    pub fn set_stroke_enabled(&mut self, id: NodeId, enabled: bool) -> GeometryResult<()> {
        let changed: Vec<NodeId> = self
            .leaves(id)
            .into_iter()
            .filter(|n| {
                self.tree
                    .get(n.index())
                    .is_some_and(|node| node.style.stroke_enabled != enabled)
            })
            .collect();
        self.restyle(id, |style| style.stroke_enabled = enabled)?;
        self.invalidate_where(&changed, DirtyReason::StrokeToggled, |_| true)
    }

    /// Recolors the fill of the node and its descendants in place.
    pub fn set_fill_color(&mut self, id: NodeId, color: Color) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.fill_color = color)?;
        for leaf in leaves {
            let Some(node) = self.tree.get_mut(leaf.index()) else {
                continue;
            };
            for record in &mut node.input.vertices {
                record.attrs.color = color;
            }
            if node.texture.is_some() {
                continue;
            }
            if let Some(span) = node.live_output().and_then(|out| out.fill_part) {
                self.geometry.fill.attributes.colors[span.first..=span.last].fill(color.to_array());
                self.tracker
                    .mark_modified(Stream::Fill, Channel::Color, span.first, span.last);
            }
        }
        Ok(())
    }

    /// Sets the fill color of textured shapes in the subtree; `None` draws the texture untinted.
    ///
    /// Shapes without a texture keep the tint for when one is set.
    pub fn set_tint(&mut self, id: NodeId, tint: Option<Color>) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.tint = tint)?;
        for leaf in leaves {
            let Some(node) = self.tree.get(leaf.index()) else {
                continue;
            };
            if node.texture.is_none() {
                continue;
            }
            if let Some(span) = node.live_output().and_then(|out| out.fill_part) {
                let color = node.style.tint_color().to_array();
                self.geometry.fill.attributes.colors[span.first..=span.last].fill(color);
                self.tracker
                    .mark_modified(Stream::Fill, Channel::Color, span.first, span.last);
            }
        }
        Ok(())
    }

    /// Recolors strokes and points of the node and its descendants in place.
    pub fn set_stroke_color(&mut self, id: NodeId, color: Color) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.stroke.color = color)?;
        for leaf in leaves {
            let parts: SmallVec<[(Stream, VertexSpan); 2]> = match self.node(leaf)?.live_output() {
                Some(out) => out.stroke_part.into_iter().chain(out.point_part).collect(),
                None => continue,
            };
            for (stream, span) in parts {
                self.geometry.colors_mut(stream)[span.first..=span.last].fill(color.to_array());
                self.tracker
                    .mark_modified(stream, Channel::Color, span.first, span.last);
            }
        }
        Ok(())
    }

    /// Replaces the material of the node and its descendants in place.
    pub fn set_material(&mut self, id: NodeId, material: Material) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.material = material)?;
        for leaf in leaves {
            let Some(node) = self.tree.get_mut(leaf.index()) else {
                continue;
            };
            for record in &mut node.input.vertices {
                record.attrs.material = material;
            }
            let Some(out) = node.live_output() else {
                continue;
            };
            let fill_spans: SmallVec<[_; 3]> = out
                .fill_part
                .into_iter()
                .chain(out.stroke_part.filter(|p| p.0 == Stream::Fill).map(|p| p.1))
                .chain(out.point_part.filter(|p| p.0 == Stream::Fill).map(|p| p.1))
                .collect();
            for span in fill_spans {
                for out in span.first..=span.last {
                    write_material(&mut self.geometry, out, &material);
                }
                for channel in MATERIAL_CHANNELS {
                    self.tracker
                        .mark_modified(Stream::Fill, channel, span.first, span.last);
                }
            }
        }
        Ok(())
    }

    /// Changes the stroke weight.
    ///
    /// 2D strokes are outlines that depend on the weight and always re-tessellate. 3D line quads
    /// and point sprites carry their half-width per vertex and are rescaled in place.
    pub fn set_stroke_weight(&mut self, id: NodeId, weight: f32) -> GeometryResult<()> {
        let weight = weight.max(0.0);
        let old: Vec<(NodeId, f32)> = self
            .leaves(id)
            .into_iter()
            .filter_map(|n| self.tree.get(n.index()).map(|node| (n, node.style.stroke.weight)))
            .collect();
        self.restyle(id, |style| style.stroke.weight = weight)?;

        for (leaf, previous) in old {
            if previous == weight {
                continue;
            }
            let node = self.node(leaf)?;
            // Round sprites only rescale while the new weight keeps their segment count.
            let cap = node.style.stroke.cap;
            let same_sprite = node.kind != GeometryKind::Points
                || sprite_outline_count(previous * 0.5, cap)
                    == sprite_outline_count(weight * 0.5, cap);
            let in_place = !self.config.is_2d()
                && previous > 0.0
                && weight > 0.0
                && same_sprite
                && node.style.stroke_enabled
                && node.live_output().is_some();
            if !in_place {
                let stroked = node.style.stroke_enabled;
                self.invalidate_where(&[leaf], DirtyReason::StrokeStyle, |_| stroked)?;
                continue;
            }

            let ratio = weight / previous;
            let Some(out) = node.live_output() else {
                continue;
            };
            let (stroke_part, point_part) = (out.stroke_part, out.point_part);
            if let Some((Stream::Line, span)) = stroke_part {
                for d in &mut self.geometry.line.attributes.directions[span.first..=span.last] {
                    d[3] *= ratio;
                }
                self.tracker
                    .mark_modified(Stream::Line, Channel::Direction, span.first, span.last);
            }
            if let Some((Stream::Point, span)) = point_part {
                for o in &mut self.geometry.point.attributes.offsets[span.first..=span.last] {
                    o[0] *= ratio;
                    o[1] *= ratio;
                }
                self.tracker
                    .mark_modified(Stream::Point, Channel::Offset, span.first, span.last);
            }
        }
        Ok(())
    }

    pub fn set_stroke_cap(&mut self, id: NodeId, cap: LineCap) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.stroke.cap = cap)?;
        let is_2d = self.config.is_2d();
        // 3D lines have no caps, only point sprites change shape.
        self.invalidate_where(&leaves, DirtyReason::StrokeStyle, |node| {
            node.style.has_stroke() && (is_2d || node.kind == GeometryKind::Points)
        })
    }

    pub fn set_stroke_join(&mut self, id: NodeId, join: LineJoin) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.stroke.join = join)?;
        if !self.config.is_2d() {
            return Ok(());
        }
        self.invalidate_where(&leaves, DirtyReason::StrokeStyle, |node| {
            node.style.has_stroke()
        })
    }

    pub fn set_texture(&mut self, id: NodeId, texture: Option<TextureId>) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.texture = texture)?;
        self.invalidate_where(&leaves, DirtyReason::Texture, |_| true)
    }

    pub fn set_texture_mode(&mut self, id: NodeId, mode: TextureMode) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.texture_mode = mode)?;
        self.invalidate_where(&leaves, DirtyReason::Texture, |node| {
            node.style.texture.is_some()
        })
    }

    pub fn set_fill_rule(&mut self, id: NodeId, rule: FillRule) -> GeometryResult<()> {
        let leaves = self.restyle(id, |style| style.fill_rule = rule)?;
        self.invalidate_where(&leaves, DirtyReason::FillRule, |node| node.style.fill)
    }

    // Transforms

    /// Combined transform of the node's ancestors, innermost first.
    fn parent_transform(&self, id: NodeId) -> Transform {
        let mut transform = Transform::identity();
        let mut current = self.tree.parent_index_unchecked(id.index());
        while let Some(index) = current {
            if let Some(node) = self.tree.get(index) {
                transform = transform.then(&node.transform);
            }
            current = self.tree.parent_index_unchecked(index);
        }
        transform
    }

    /// Composes `transform` after the node's current transform.
    ///
    /// When the node has output geometry, its vertices are transformed in place and marked
    /// dirty; otherwise the transform is applied at the next tessellation.
    ///
    /// ```
    /// use tessera::{Color, NoTextures, Primitive, ShapeTree, Style, TessConfig, Transform};
    ///
    /// let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    /// let rect = tree
    ///     .create_primitive(tree.root(), Primitive::rect(0.0, 0.0, 10.0, 10.0), Style::fill_only(Color::WHITE))
    ///     .unwrap();
    /// tree.update_tessellation(&NoTextures).unwrap();
    ///
    /// tree.apply_transform(rect, &Transform::translation(5.0, 0.0, 0.0)).unwrap();
    /// assert!(!tree.needs_tessellation());
    /// assert_eq!(tree.geometry().fill.attributes.positions[0], [5.0, 0.0, 0.0]);
    /// ```
    pub fn apply_transform(&mut self, id: NodeId, transform: &Transform) -> GeometryResult<()> {
        let node = self.node(id)?;
        let updated = node.transform.then(transform);
        let fast_path = node.state == NodeState::Tessellated && !node.ranges.is_empty();
        let ranges = node.ranges;
        self.node_mut(id)?.transform = updated;

        if !fast_path {
            if self.node(id)?.state != NodeState::Open {
                self.mark_dirty(id, DirtyReason::Transform)?;
            }
            return Ok(());
        }

        // Output vertices are already in world space, so conjugate by the ancestors' transform.
        let parent = self.parent_transform(id);
        let world = if parent.is_identity() {
            *transform
        } else {
            match parent.inverse() {
                Some(inverse) => inverse.then(transform).then(&parent),
                None => return self.mark_dirty(id, DirtyReason::Transform),
            }
        };

        for stream in Stream::ALL {
            let Some(span) = ranges.vertices(stream) else {
                continue;
            };
            let channels = self
                .geometry
                .apply_affine(stream, span.first, span.last, &world);
            for channel in channels {
                self.tracker
                    .mark_modified(stream, channel, span.first, span.last);
            }
        }
        Ok(())
    }

    /// Undoes every transform applied to the node. Singular transforms cannot be undone and are
    /// left in place.
    pub fn reset_transform(&mut self, id: NodeId) -> GeometryResult<()> {
        let current = self.node(id)?.transform;
        if current.is_identity() {
            return Ok(());
        }
        let Some(inverse) = current.inverse() else {
            tracing::warn!(node = %id, "cannot reset a non-invertible transform");
            return Ok(());
        };
        self.apply_transform(id, &inverse)?;
        self.node_mut(id)?.transform = Transform::identity();
        Ok(())
    }

    // Tessellation

    /// Re-tessellates and re-aggregates the whole tree if anything requires it.
    ///
    /// Returns whether a pass ran. Every open node must be finished first.
    pub fn update_tessellation(&mut self, textures: &impl TextureProvider) -> GeometryResult<bool> {
        if !self.needs_tessellation {
            return Ok(false);
        }
        let order = self.subtree(self.root);
        if let Some(open) = order.iter().find(|n| {
            self.tree
                .get(n.index())
                .is_some_and(|node| node.state == NodeState::Open)
        }) {
            return Err(GeometryError::ShapeOpen(*open));
        }

        // Leaves are tessellated into scratch geometry so that a failed pass leaves the previous
        // output and every node's ranges into it untouched.
        let mut scratch = self.geometry.empty_like();
        let mut staged = Vec::new();
        self.tessellator.reset_metrics();

        for id in order {
            let Some(node) = self.tree.get(id.index()) else {
                continue;
            };
            if node.is_group() {
                continue;
            }
            let built = match node.family {
                Family::Primitive(primitive) => Some(primitive::build(&primitive, &node.style)),
                _ => None,
            };
            let texture = node.style.texture.and_then(|texture| {
                let info = textures.texture_info(texture);
                if info.is_none() {
                    tracing::warn!(node = %id, %texture, "texture is not available, drawing untextured");
                }
                info
            });

            let shape = match &built {
                Some(built) => LeafShape {
                    kind: built.kind,
                    input: &built.input,
                    closed: built.closed,
                    convex: built.convex,
                    style: &node.style,
                    texture,
                    normalized_uv: built.normalized_uv,
                    stroke_override: built.stroke_override.as_deref(),
                },
                None => LeafShape {
                    kind: node.kind,
                    input: &node.input,
                    closed: node.closed,
                    convex: node.convex,
                    style: &node.style,
                    texture,
                    normalized_uv: node.normalized_uv,
                    stroke_override: node.stroke_override.as_deref(),
                },
            };
            let output = self.tessellator.tessellate_leaf(&shape, &mut scratch)?;
            staged.push((id, built, texture, output));
        }

        for (id, built, texture, output) in staged {
            let Some(node) = self.tree.get_mut(id.index()) else {
                continue;
            };
            if let Some(built) = built {
                node.kind = built.kind;
                node.input = built.input;
                node.closed = built.closed;
                node.convex = built.convex;
                node.normalized_uv = built.normalized_uv;
                node.stroke_override = built.stroke_override;
            }
            node.texture = texture;
            node.leaf = Some(output);
        }
        self.geometry = scratch;

        let mut aggregator = Aggregator::new(&mut self.geometry, &self.config);
        aggregate_node(&mut self.tree, self.root.index(), &mut aggregator);

        self.needs_tessellation = false;
        self.tracker.mark_full_upload();
        for stream in Stream::ALL {
            tracing::debug!(
                ?stream,
                vertices = self.geometry.vertex_count(stream),
                indices = self.geometry.indices(stream).len(),
                blocks = self.geometry.cache(stream).len(),
                "tessellated shape tree"
            );
        }
        Ok(true)
    }
}

const MATERIAL_CHANNELS: [Channel; 4] = [
    Channel::Ambient,
    Channel::Specular,
    Channel::Emissive,
    Channel::Shininess,
];

fn write_material(geometry: &mut TessGeometry, out: usize, material: &Material) {
    let fill = &mut geometry.fill.attributes;
    fill.ambient[out] = material.ambient.to_array();
    fill.specular[out] = material.specular.to_array();
    fill.emissive[out] = material.emissive.to_array();
    fill.shininess[out] = material.shininess;
}

/// Post-order aggregation of a subtree.
fn aggregate_node(
    tree: &mut Tree<ShapeNode>,
    index: usize,
    aggregator: &mut Aggregator,
) -> Option<(NodeRanges, bool)> {
    let (ranges, textured) = if tree.get(index)?.is_group() {
        let children: SmallVec<[usize; 8]> = tree.children(index).iter().copied().collect();
        let mut child_ranges = Vec::with_capacity(children.len());
        let mut textured = false;
        for child in children {
            if let Some((ranges, child_textured)) = aggregate_node(tree, child, aggregator) {
                child_ranges.push(ranges);
                textured |= child_textured;
            }
        }
        (aggregator.merge_group(&child_ranges), textured)
    } else {
        let node = tree.get(index)?;
        let textured = node.style.texture.is_some();
        let ranges = node
            .leaf
            .as_ref()
            .map(|leaf| aggregator.rebase_leaf(leaf, textured))
            .unwrap_or_default();
        (ranges, textured)
    };

    let node = tree.get_mut(index)?;
    aggregator.bake(&ranges, &node.transform);
    node.ranges = ranges;
    node.textured = textured;
    node.state = NodeState::Tessellated;
    Some((ranges, textured))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::Stroke;
    use crate::sync::NoTextures;

    fn square(tree: &mut ShapeTree, parent: NodeId, x: f32, style: Style) -> NodeId {
        let id = tree.create_path(parent, style).unwrap();
        for p in [(x, 0.0), (x + 10.0, 0.0), (x + 10.0, 10.0), (x, 10.0)] {
            tree.vertex(id, p).unwrap();
        }
        tree.end_shape(id, true).unwrap();
        id
    }

    #[test]
    fn nodes_walk_through_the_state_machine() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let path = tree.create_path(tree.root(), Style::default()).unwrap();
        assert_eq!(tree.state(path), Ok(NodeState::Open));
        tree.vertex(path, (0.0, 0.0)).unwrap();
        assert_eq!(tree.update_tessellation(&NoTextures), Err(GeometryError::ShapeOpen(path)));

        tree.end_shape(path, false).unwrap();
        assert_eq!(tree.state(path), Ok(NodeState::Untessellated));
        assert_eq!(tree.vertex(path, (1.0, 1.0)), Err(GeometryError::ShapeNotOpen(path)));

        assert_eq!(tree.update_tessellation(&NoTextures), Ok(true));
        assert_eq!(tree.state(path), Ok(NodeState::Tessellated));
        assert_eq!(tree.update_tessellation(&NoTextures), Ok(false));

        tree.mark_dirty(path, DirtyReason::Vertices).unwrap();
        assert_eq!(tree.state(path), Ok(NodeState::Untessellated));
        assert_eq!(tree.state(tree.root()), Ok(NodeState::Untessellated));
    }

    #[test]
    fn curves_are_rejected_on_direct_kinds() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let tris = tree
            .create_geometry(tree.root(), GeometryKind::Triangles, Style::default())
            .unwrap();
        tree.vertex(tris, (0.0, 0.0)).unwrap();
        assert_eq!(
            tree.quadratic_vertex(tris, (1.0, 1.0), (2.0, 0.0)),
            Err(GeometryError::CurveNotSupported(tris))
        );
    }

    #[test]
    fn fill_color_updates_in_place_and_marks_the_fill_range() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let root = tree.root();
        let a = square(&mut tree, root, 0.0, Style::fill_only(Color::WHITE));
        let b = square(&mut tree, root, 20.0, Style::fill_only(Color::WHITE));
        tree.update_tessellation(&NoTextures).unwrap();
        tree.tracker.clear();

        tree.set_fill_color(b, Color::rgb(255, 0, 0)).unwrap();
        assert!(!tree.needs_tessellation());
        assert_eq!(
            tree.tracker().range(Stream::Fill, Channel::Color).map(|r| r.as_range()),
            Some(4..=7)
        );
        assert_eq!(tree.geometry().fill.attributes.colors[4], [255, 0, 0, 255]);
        assert_eq!(tree.geometry().fill.attributes.colors[0], [255; 4]);
        assert!(!tree.tracker().is_modified(Stream::Fill, Channel::Position));
        assert_eq!(tree.style(a).unwrap().fill_color, Color::WHITE);
    }

    #[test]
    fn single_vertex_color_marks_a_single_index() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let root = tree.root();
        let a = square(&mut tree, root, 0.0, Style::fill_only(Color::WHITE));
        tree.update_tessellation(&NoTextures).unwrap();
        tree.tracker.clear();

        tree.set_vertex_color(a, 2, Color::BLACK).unwrap();
        assert_eq!(
            tree.tracker().pending(),
            vec![(Stream::Fill, Channel::Color)]
        );
        assert_eq!(
            tree.tracker().range(Stream::Fill, Channel::Color).map(|r| r.as_range()),
            Some(2..=2)
        );
        assert_eq!(
            tree.set_vertex_color(a, 9, Color::BLACK),
            Err(GeometryError::VertexOutOfRange {
                node: a,
                index: 9,
                len: 4
            })
        );
    }

    #[test]
    fn interpolated_fills_fall_back_to_tessellation() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let path = tree.create_path(tree.root(), Style::fill_only(Color::WHITE)).unwrap();
        tree.vertex(path, (0.0, 0.0)).unwrap();
        tree.bezier_vertex(path, (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)).unwrap();
        tree.end_shape(path, true).unwrap();
        tree.update_tessellation(&NoTextures).unwrap();

        tree.set_vertex_color(path, 0, Color::BLACK).unwrap();
        assert!(tree.needs_tessellation());
    }

    #[test]
    fn stroke_weight_retessellates_in_2d_and_rescales_in_3d() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let root = tree.root();
        let a = square(&mut tree, root, 0.0, Style::stroke_only(Stroke::new(2.0, Color::BLACK)));
        tree.update_tessellation(&NoTextures).unwrap();
        tree.set_stroke_weight(a, 4.0).unwrap();
        assert!(tree.needs_tessellation());

        let mut tree = ShapeTree::new(TessConfig::three_d()).unwrap();
        let root = tree.root();
        let a = square(&mut tree, root, 0.0, Style::stroke_only(Stroke::new(2.0, Color::BLACK)));
        tree.update_tessellation(&NoTextures).unwrap();
        tree.set_stroke_weight(a, 4.0).unwrap();
        assert!(!tree.needs_tessellation());
        assert_eq!(tree.geometry().line.attributes.directions[0][3], 2.0);
        assert!(tree.tracker().is_modified(Stream::Line, Channel::Direction));
    }

    #[test]
    fn transforms_bake_at_tessellation_and_use_the_fast_path_afterwards() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let root = tree.root();
        let group = tree.create_group(root).unwrap();
        let a = square(&mut tree, group, 0.0, Style::fill_only(Color::WHITE));
        tree.apply_transform(group, &Transform::translation(100.0, 0.0, 0.0))
            .unwrap();
        tree.update_tessellation(&NoTextures).unwrap();
        assert_eq!(tree.geometry().fill.attributes.positions[0], [100.0, 0.0, 0.0]);

        tree.tracker.clear();
        tree.apply_transform(a, &Transform::scale(2.0, 2.0, 1.0)).unwrap();
        assert!(!tree.needs_tessellation());
        // Scaled in the child's own frame, then moved by the group.
        assert_eq!(tree.geometry().fill.attributes.positions[2], [120.0, 20.0, 0.0]);
        assert!(tree.tracker().is_modified(Stream::Fill, Channel::Position));

        tree.reset_transform(a).unwrap();
        let p = tree.geometry().fill.attributes.positions[2];
        assert!((p[0] - 110.0).abs() < 1e-3 && (p[1] - 10.0).abs() < 1e-3);
        assert!(tree.transform(a).unwrap().is_identity());
    }

    #[test]
    fn attributes_must_be_declared_consistently() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let id = tree.declare_attribute("weight", AttributeDecl::float(1)).unwrap();
        assert_eq!(tree.declare_attribute("weight", AttributeDecl::float(1)), Ok(id));
        assert!(matches!(
            tree.declare_attribute("weight", AttributeDecl::float(2)),
            Err(GeometryError::AttributeMismatch { .. })
        ));

        let path = tree.create_path(tree.root(), Style::default()).unwrap();
        assert_eq!(
            tree.attribute(path, "missing", &[1.0]),
            Err(GeometryError::UnknownAttribute("missing".into()))
        );
        assert!(matches!(
            tree.attribute(path, "weight", &[1.0, 2.0]),
            Err(GeometryError::AttributeArity { .. })
        ));
        tree.attribute(path, "weight", &[0.5]).unwrap();
    }

    #[test]
    fn custom_attributes_reach_the_fill_stream_and_update_in_place() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let id = tree.declare_attribute("heat", AttributeDecl::float(1)).unwrap();
        let root = tree.root();
        let plain = square(&mut tree, root, 0.0, Style::fill_only(Color::WHITE));
        let path = tree.create_path(root, Style::fill_only(Color::WHITE)).unwrap();
        tree.attribute(path, "heat", &[0.25]).unwrap();
        for p in [(20.0, 0.0), (30.0, 0.0), (30.0, 10.0)] {
            tree.vertex(path, p).unwrap();
        }
        tree.end_shape(path, true).unwrap();
        tree.update_tessellation(&NoTextures).unwrap();

        let channel = tree.geometry().fill.attributes.custom_channel(id).unwrap();
        assert_eq!(channel.values, vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.25, 0.25]);

        tree.tracker.clear();
        tree.set_vertex_attribute(path, 1, "heat", &[1.0]).unwrap();
        let channel = tree.geometry().fill.attributes.custom_channel(id).unwrap();
        assert_eq!(channel.values[5], 1.0);
        assert_eq!(
            tree.tracker().range(Stream::Fill, Channel::Custom(id)).map(|r| r.as_range()),
            Some(5..=5)
        );
        assert!(tree.input(plain).is_ok());
    }

    #[test]
    fn removed_nodes_disappear_from_the_output() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let root = tree.root();
        let a = square(&mut tree, root, 0.0, Style::fill_only(Color::WHITE));
        let b = square(&mut tree, root, 20.0, Style::fill_only(Color::WHITE));
        tree.update_tessellation(&NoTextures).unwrap();
        assert_eq!(tree.geometry().vertex_count(Stream::Fill), 8);

        tree.remove(a).unwrap();
        assert_eq!(tree.state(a), Err(GeometryError::NodeNotFound(a)));
        assert_eq!(tree.children(root).unwrap(), vec![b]);
        tree.update_tessellation(&NoTextures).unwrap();
        assert_eq!(tree.geometry().vertex_count(Stream::Fill), 4);
        assert_eq!(tree.remove(root), Err(GeometryError::RootRemoval));
    }

    #[test]
    fn add_remove_churn_reuses_node_slots() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let root = tree.root();
        let group = tree.create_group(root).unwrap();
        square(&mut tree, group, 0.0, Style::fill_only(Color::WHITE));
        let count = tree.node_count();

        for i in 0..50 {
            let child = square(&mut tree, group, i as f32, Style::fill_only(Color::WHITE));
            tree.update_tessellation(&NoTextures).unwrap();
            tree.remove(child).unwrap();
        }
        assert_eq!(tree.node_count(), count);
        assert_eq!(tree.children(group).unwrap().len(), 1);
        tree.update_tessellation(&NoTextures).unwrap();
        assert_eq!(tree.geometry().vertex_count(Stream::Fill), 4);
    }

    #[test]
    fn malformed_paths_leave_the_node_untouched() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let path = tree.create_path(tree.root(), Style::default()).unwrap();
        tree.vertex(path, (0.0, 0.0)).unwrap();
        let err = tree.set_path(
            path,
            &[[0.0, 0.0, 0.0]],
            &[VertexCode::Vertex, VertexCode::QuadraticVertex],
            false,
        );
        assert!(matches!(err, Err(GeometryError::MalformedPath { .. })));
        assert_eq!(tree.input(path).unwrap().len(), 1);
    }
}

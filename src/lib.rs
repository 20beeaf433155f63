//! Retained-mode tessellation and buffer aggregation for 2D and 3D vector shapes.
//!
//! A [`ShapeTree`] holds groups, paths, free-form geometry and primitives. Tessellation turns the
//! whole tree into three shared vertex streams (fills, 3D lines and 3D points) whose indices are
//! split into index-cache blocks that a 16-bit index buffer can address. Style, per-vertex and
//! transform edits update the tessellated geometry in place where possible and record the
//! modified vertex ranges, so [`ShapeTree::sync`] uploads only what changed.

pub use wgpu;

mod aggregate;
mod color;
mod config;
mod dirty;
mod error;
pub mod gpu;
mod id;
mod index_cache;
mod input;
mod metrics;
mod output;
mod primitive;
mod shape;
mod stroke;
pub mod stroker;
mod style;
mod sync;
mod tessellator;
mod transform;

pub use aggregate::{NodeRanges, StreamRange};
pub use color::Color;
pub use config::{Dimension, TessConfig, MAX_INDEX_LIMIT};
pub use dirty::{Channel, DirtyRange, DirtyTracker, Stream};
pub use error::{GeometryError, GeometryResult};
pub use id::{NodeId, TextureId};
pub use index_cache::{BlockSpan, IndexBlock, IndexCache, VertexSpan};
pub use input::{
    AttributeDecl, AttributeKind, Contour, InputGeometry, PathCommand, TessVertex, Vertex,
    VertexAttrs, VertexCode, VertexRecord,
};
pub use metrics::TessMetrics;
pub use output::{
    CustomChannel, FillAttributes, LineAttributes, PointAttributes, StreamAttributes, TessGeometry,
    TessStream,
};
pub use primitive::{ArcMode, Primitive};
pub use shape::{DirtyReason, Family, NodeState, ShapeTree};
pub use stroke::{LineCap, LineJoin, Stroke};
pub use style::{FillRule, Material, Style, TextureMode};
pub use sync::{
    BufferKey, BufferTarget, BufferUploader, DrawBackend, DrawCall, NoTextures, SyncReport,
    TextureInfo, TextureProvider,
};
pub use tessellator::{GeometryKind, StrokePath, Tessellator};
pub use transform::Transform;

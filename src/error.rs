use crate::id::NodeId;
use crate::input::AttributeKind;

/// Errors reported by the authoring API and the tessellation pass.
///
/// Degenerate geometry (zero-length segments, duplicate points, collapsed contours) is never an
/// error: it is skipped or coalesced during tessellation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("vertex code {code_index} needs {required} point(s) but only {available} remain")]
    MalformedPath {
        code_index: usize,
        required: usize,
        available: usize,
    },
    #[error("{command} segment has no current point to start from")]
    MissingStartVertex { command: &'static str },
    #[error("shape {0} is still open")]
    ShapeOpen(NodeId),
    #[error("shape {0} is not open for vertex input")]
    ShapeNotOpen(NodeId),
    #[error("shape {0} is a group and holds no geometry")]
    NotGeometry(NodeId),
    #[error("shape {0} only accepts plain vertices")]
    CurveNotSupported(NodeId),
    #[error("shape {0} is not a group and cannot have children")]
    NotGroup(NodeId),
    #[error("the root shape cannot be removed")]
    RootRemoval,
    #[error("shape {0} does not exist or was removed")]
    NodeNotFound(NodeId),
    #[error("vertex {index} is out of range for shape {node} with {len} vertices")]
    VertexOutOfRange { node: NodeId, index: usize, len: usize },
    #[error("attribute `{name}` was declared as {expected:?} but is used as {found:?}")]
    AttributeMismatch {
        name: String,
        expected: (AttributeKind, u8),
        found: (AttributeKind, u8),
    },
    #[error("attribute `{0}` was never declared")]
    UnknownAttribute(String),
    #[error("attribute `{name}` expects {expected} component(s), got {found}")]
    AttributeArity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{what}: requested {requested}, limit is {limit}")]
    CapacityExceeded {
        what: &'static str,
        requested: usize,
        limit: usize,
    },
    #[error("texture of {width}x{height} exceeds the maximum size of {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type GeometryResult<T> = Result<T, GeometryError>;

pub mod expectations;
pub mod recording;
pub mod scene;

pub use expectations::{check_geometry, Check, GeometryExpectation};
pub use recording::{DrawEvent, RecordingBackend, RecordingUploader};
pub use scene::{build_main_scene, scene_textures, CANVAS_HEIGHT, CANVAS_WIDTH};

// lib.rs — 360° 等距柱状全景查看器

pub mod animation;
pub mod camera;
pub mod config;
pub mod cubemap;
pub mod equirect;
pub mod error;
pub mod input;
pub mod math;
pub mod panorama;
pub mod projection;
pub mod render_loop;
pub mod renderer;
pub mod software;
pub mod streamer;

pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use panorama::{FrameOutcome, PanoramaViewer, ViewMode};
pub use projection::ViewParams;

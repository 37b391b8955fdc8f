// error.rs — 统一错误类型

// 运行期的加载错误在 streamer 内部记日志并转为状态，不向外抛
#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to load '{source_name}': {message}")]
    Resource { source_name: String, message: String },

    #[error("image {width}x{height} exceeds max texture dimension {max}")]
    Capability { width: u32, height: u32, max: u32 },

    #[error("rendering context unavailable: {0}")]
    Environment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ViewerError {
    pub fn resource<S: ToString, M: ToString>(source: S, message: M) -> Self {
        ViewerError::Resource {
            source_name: source.to_string(),
            message: message.to_string(),
        }
    }

    pub fn environment<T: ToString>(msg: T) -> Self {
        ViewerError::Environment(msg.to_string())
    }

    // 不影响已在运行的查看器
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ViewerError::Resource { .. }
                | ViewerError::Capability { .. }
                | ViewerError::Io(_)
                | ViewerError::Image(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;

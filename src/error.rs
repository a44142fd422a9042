//! Error type for the bridge.
//!
//! Only setup and lifecycle problems surface as [`Error`]. Per-frame GL
//! trouble (incomplete framebuffers, GL error codes, missing extension
//! symbols) is logged and rendering continues.

/// Errors surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A canvas dimension was zero or negative.
    #[error("invalid canvas size {width}x{height}")]
    InvalidSize {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },

    /// The map has not been initialized yet.
    #[error("map is not initialized")]
    NotInitialized,

    /// `initialize` was called twice.
    #[error("map is already initialized")]
    AlreadyInitialized,

    /// The view was destroyed and cannot be brought back.
    #[error("map view has been destroyed")]
    Destroyed,

    /// A GL object could not be created.
    #[error("GL error: {0}")]
    Gl(String),

    /// The map engine refused an operation.
    #[error("map engine error: {0}")]
    Engine(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds values the controller cannot use.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

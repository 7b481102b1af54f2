use tokio_tungstenite::tungstenite;

/// A type-erased error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by the fallible parts of the handler-facing API.
///
/// The chain machinery itself never fails; these surface from streaming
/// sends/receives and request decoding, and are handled inside the
/// handler that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body was already consumed by an earlier stage.
    #[error("request body already consumed")]
    BodyConsumed,

    #[error("failed to read request body: {0}")]
    Body(BoxError),

    /// A streaming operation was attempted before the connection was
    /// upgraded.
    #[error("connection has not been upgraded")]
    NotUpgraded,

    #[error(transparent)]
    Ws(#[from] tungstenite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Query(#[from] serde_urlencoded::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

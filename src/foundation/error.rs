/// Convenience result type used across voxfuse.
pub type VoxfuseResult<T> = Result<T, VoxfuseError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum VoxfuseError {
    /// Invalid configuration detected at construction or registration time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal inconsistency that correct setup should make impossible.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Destination element kind outside the supported closed set.
    #[error("unsupported voxel kind: {0}")]
    UnsupportedKind(String),

    /// Wrapped lower-level error from collaborators or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VoxfuseError {
    /// Build a [`VoxfuseError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`VoxfuseError::Consistency`] value.
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }
}

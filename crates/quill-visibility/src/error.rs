use thiserror::Error;
use uuid::Uuid;

/// Failure to decide visibility. Callers must treat it as "hidden".
#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("visibility store unavailable: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum MuteError {
    #[error("a user cannot mute themself")]
    SelfMute,

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("mute store unavailable: {0}")]
    Store(#[from] anyhow::Error),
}

impl MuteError {
    /// Whether the caller supplied bad input, as opposed to a store failure.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::SelfMute | Self::UserNotFound(_))
    }
}

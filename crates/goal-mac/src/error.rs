//! Protocol engine error types.

use goal_core::error::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum MacError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frame_error() {
        let fe = FrameError::TooShort { min: 30, actual: 1 };
        let me: MacError = fe.into();
        assert!(matches!(me, MacError::Frame(_)));
        assert_eq!(me.to_string(), "frame error: frame too short: need 30 bytes, got 1");
    }
}

//! Frame codec error types.

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short: need {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("invalid frame type tag: {0:#04x}")]
    InvalidFrameType(u8),

    #[error("invalid direction byte: {0:#04x}")]
    InvalidDirection(u8),

    #[error("id trailer truncated: declared {declared} ids, room for {available}")]
    TrailerTruncated { declared: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = FrameError::TooShort { min: 30, actual: 4 };
        assert_eq!(err.to_string(), "frame too short: need 30 bytes, got 4");

        let err = FrameError::InvalidFrameType(0x09);
        assert_eq!(err.to_string(), "invalid frame type tag: 0x09");

        let err = FrameError::TrailerTruncated {
            declared: 5,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "id trailer truncated: declared 5 ids, room for 2"
        );
    }
}

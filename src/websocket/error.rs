//! Error kinds for the signaling state machine (spec §4.D, §7
//! `SignalingProtocolError`/`PolicyDenied`). Each variant carries the close
//! code it maps to, so the connection loop matches on the concrete kind
//! rather than downstream-guessing a code from a message string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("malformed signaling frame: {0}")]
    Malformed(&'static str),
    #[error("policy denied: {0}")]
    PolicyDenied(&'static str),
    #[error("timed out: {0}")]
    Timeout(&'static str),
}

impl SignalingError {
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Malformed(_) => 4400,
            Self::PolicyDenied(_) => 4403,
            Self::Timeout(_) => 4408,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(reason) | Self::PolicyDenied(reason) | Self::Timeout(reason) => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_match_spec() {
        assert_eq!(SignalingError::Malformed("x").close_code(), 4400);
        assert_eq!(SignalingError::PolicyDenied("x").close_code(), 4403);
        assert_eq!(SignalingError::Timeout("x").close_code(), 4408);
    }
}

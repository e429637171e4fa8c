use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;
use warren_core::Command;

const TOKEN_DOMAIN: &str = "warren";
const TOKEN_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded command payload.
pub(crate) const TOKEN_HEADER: &str = "warren:v1";
/// Delimiter used to separate the prefix and payload.
const FIELD_DELIMITER: char = ':';

/// Command sequence captured so a run can be reproduced from a single line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ReplayToken {
    /// Commands in the order they were applied.
    pub(crate) commands: Vec<Command>,
}

impl ReplayToken {
    /// Captures `commands`.
    #[must_use]
    pub(crate) fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    /// Encodes the commands into a single-line string.
    pub(crate) fn encode(&self) -> Result<String, TokenError> {
        let bytes = bincode::serialize(&self.commands).map_err(TokenError::Serialize)?;
        let encoded = URL_SAFE_NO_PAD.encode(bytes);
        Ok(format!("{TOKEN_HEADER}{FIELD_DELIMITER}{encoded}"))
    }

    /// Decodes a token from its string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, TokenError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TokenError::EmptyPayload);
        }

        let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
        let domain = parts.next().ok_or(TokenError::MissingPrefix)?;
        let version = parts.next().ok_or(TokenError::MissingVersion)?;
        let payload = parts.next().ok_or(TokenError::MissingPayload)?;

        if domain != TOKEN_DOMAIN {
            return Err(TokenError::InvalidPrefix(domain.to_owned()));
        }
        if version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(version.to_owned()));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.as_bytes())
            .map_err(TokenError::InvalidEncoding)?;
        let commands = bincode::deserialize(&bytes).map_err(TokenError::InvalidPayload)?;
        Ok(Self { commands })
    }
}

/// Errors that can occur while encoding or decoding replay tokens.
#[derive(Debug, Error)]
pub(crate) enum TokenError {
    /// The provided string was empty or contained only whitespace.
    #[error("replay token was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("replay token is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("replay token is missing the version")]
    MissingVersion,
    /// The payload segment was missing.
    #[error("replay token is missing the payload")]
    MissingPayload,
    /// The token used an unexpected prefix.
    #[error("replay token prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The token used an unsupported version.
    #[error("replay token version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode replay payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The decoded payload is not a command list.
    #[error("could not parse replay payload: {0}")]
    InvalidPayload(#[source] bincode::Error),
    /// The commands could not be serialised.
    #[error("could not serialise commands: {0}")]
    Serialize(#[source] bincode::Error),
}

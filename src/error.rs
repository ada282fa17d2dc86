use thiserror::Error;

use crate::gs2::ChannelBinding;
use crate::mechanism::Mechanism;

/// An opaque failure reported by a [`CredentialLookup`](server/trait.CredentialLookup.html).
pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// The SCRAM engine error cases.
///
/// Every error is terminal for the exchange that produced it. The state that returned it is
/// consumed, so a new exchange with fresh nonces has to be started.
#[derive(Debug, Error)]
pub enum Error {
    /// A message violated the `key[=value]` grammar at `offset`.
    #[error("Unexpected byte {byte:#04x} at offset {offset}")]
    Malformed {
        /// The offending byte.
        byte: u8,
        /// Zero based position of `byte` in the message.
        offset: usize,
    },
    /// A message was well formed but its content wasn't as required. `Kind` contains further
    /// information.
    #[error("{0}")]
    Protocol(Kind),
    /// The server required a mandatory extension to be present that this client doesn't support.
    #[error("Unsupported extension")]
    UnsupportedExtension,
    /// The mechanism name is unknown or has no hash implementation available.
    #[error("Unsupported mechanism '{0}'")]
    UnsupportedMechanism(String),
    /// The channel binding observed from the client differs from the one configured.
    #[error("Channel binding mismatch")]
    ChannelBindingMismatch,
    /// A mechanism was configured with a channel binding it doesn't allow. The `-PLUS` mechanisms
    /// need a concrete binding, the others must not bind the channel.
    #[error("{mechanism} can't be used with channel binding '{channel_binding}'")]
    IncompatibleChannelBinding {
        /// The configured mechanism.
        mechanism: Mechanism,
        /// The configured channel binding.
        channel_binding: ChannelBinding,
    },
    /// The client proof or the server signature didn't match.
    #[error("Verification failed")]
    VerificationFailed,
    /// The server rejected the authentication request. `String` contains a message from the server.
    #[error("Authentication error {0}")]
    Authentication(String),
    /// The credential lookup failed.
    #[error("Credential lookup failed: {0}")]
    Lookup(#[source] LookupError),
}

/// The kinds of protocol errors.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum Kind {
    /// The client sent a nonce which doesn't match the one of this exchange.
    #[error("Invalid nonce")]
    InvalidNonce,
    /// The content of the field `Field` is invalid.
    #[error("Invalid field {0:?}")]
    InvalidField(Field),
    /// The field `Field` was expected but not found.
    #[error("Expected field {0:?}")]
    ExpectedField(Field),
}

/// The fields used in the exchanged messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Field {
    /// Nonce
    Nonce,
    /// Salt
    Salt,
    /// Iterations
    Iterations,
    /// Verify or Error
    VerifyOrError,
    /// Channel Binding
    ChannelBinding,
    /// Authorization ID
    Authzid,
    /// Authcid
    Authcid,
    /// GS2Header
    GS2Header,
    /// The server-first message as a whole
    Challenge,
}

impl From<Kind> for Error {
    fn from(kind: Kind) -> Self {
        Error::Protocol(kind)
    }
}

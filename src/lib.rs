//! # Salted Challenge Response Authentication Mechanism (SCRAM)
//!
//! This crate provides the engine of both sides of a SCRAM exchange according to RFC5802,
//! including the GS2 header with the authorization identity and channel binding. The hash family
//! is selectable: SHA-1, the SHA-2 family from SHA-224 to SHA-512 and the SHA-3 family are
//! supported.
//!
//! # Usage
//!
//! The server and the client exchange four messages. There is a rust type for each state of
//! either side. Calling the methods
//! [`client_first`](struct.ScramClient.html#method.client_first),
//! [`handle_server_first`](client/struct.ServerFirst.html#method.handle_server_first),
//! [`client_final`](client/struct.ClientFinal.html#method.client_final) and
//! [`handle_server_final`](client/struct.ServerFinal.html#method.handle_server_final) on the client
//! side, and [`handle_client_first`](struct.ScramServer.html#method.handle_client_first),
//! [`server_first`](server/struct.ServerFirst.html#method.server_first),
//! [`handle_client_final`](server/struct.ClientFinal.html#method.handle_client_final) and
//! [`server_final`](server/struct.ServerFinal.html#method.server_final) on the server side
//! advances the handshake step by step. Every state is consumed by its step, so a failed step ends
//! the exchange.
//!
//! Transport is up to the caller, the example below passes the messages directly.
//!
//! ```rust
//! use std::num::NonZeroU32;
//!
//! use scram_gs2::{
//!     hash_password, ChannelBinding, HashAlgorithm, LookupError, SaltInfo, ScramClient,
//!     ScramServer,
//! };
//!
//! // The server keeps the salt, the iteration count and the salted password.
//! let iterations = NonZeroU32::new(4096).unwrap();
//! let salted_password = hash_password(HashAlgorithm::Sha256, "pencil", iterations, b"pepper");
//! let lookup = |username: &str| -> Result<SaltInfo, LookupError> {
//!     match username {
//!         "user" => Ok(SaltInfo::new(b"pepper".to_vec(), 4096)),
//!         _ => Err("unknown user".into()),
//!     }
//! };
//!
//! let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
//! let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
//!
//! let (client, client_first) = client.client_first(None, "user")?;
//! let server = server.handle_client_first(&client_first, &lookup)?;
//! let (server, server_first) = server.server_first();
//!
//! let client = client.handle_server_first(&server_first, "pencil")?;
//! let (client, client_final) = client.client_final();
//!
//! // Any error returned here means that the client couldn't prove its identity.
//! let server = server.handle_client_final(&client_final, &salted_password)?;
//! let server_final = server.server_final(&salted_password);
//!
//! // Any error returned here means that the server couldn't prove its identity.
//! client.handle_server_final(&server_final, "pencil")?;
//! # Ok::<(), scram_gs2::Error>(())
//! ```

mod error;
mod exchange;
mod gs2;
mod mechanism;
mod params;
mod utils;

pub mod client;
pub mod server;

pub use crate::client::ScramClient;
pub use crate::error::{Error, Field, Kind, LookupError};
pub use crate::gs2::{ChannelBinding, Gs2Header};
pub use crate::mechanism::{
    HashAlgorithm, Mechanism, MECHANISMS, SCRAM_SHA3_224, SCRAM_SHA3_224_PLUS, SCRAM_SHA3_256,
    SCRAM_SHA3_256_PLUS, SCRAM_SHA3_384, SCRAM_SHA3_384_PLUS, SCRAM_SHA3_512, SCRAM_SHA3_512_PLUS,
    SCRAM_SHA_1, SCRAM_SHA_1_PLUS, SCRAM_SHA_224, SCRAM_SHA_224_PLUS, SCRAM_SHA_256,
    SCRAM_SHA_256_PLUS, SCRAM_SHA_384, SCRAM_SHA_384_PLUS, SCRAM_SHA_512, SCRAM_SHA_512_PLUS,
};
pub use crate::params::{Param, Params};
pub use crate::server::{CredentialLookup, SaltInfo, ScramServer};
pub use crate::utils::hash_password;

/// The length of the nonce each side contributes.
const NONCE_LENGTH: usize = 24;

/// The highest iteration count accepted in a server-first message. A larger count is rejected
/// with `Kind::InvalidField(Field::Iterations)` before any key derivation runs. The server refuses
/// to offer a larger count as well.
pub const MAX_ITERATIONS: u32 = 10_000_000;

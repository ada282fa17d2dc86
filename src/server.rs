use std::num::NonZeroU32;

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use tracing::debug;

use crate::error::{Error, Field, Kind, LookupError};
use crate::exchange::{Challenge, Exchange, Transcript};
use crate::gs2::{ChannelBinding, Gs2Header};
use crate::mechanism::{HashAlgorithm, Mechanism};
use crate::utils::generate_nonce;
use crate::MAX_ITERATIONS;

/// The salt and iteration count stored for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltInfo {
    salt: Vec<u8>,
    iterations: u32,
}

impl SaltInfo {
    /// Create a new SaltInfo. `iterations` has to be the count the stored salted password was
    /// derived with.
    pub fn new(salt: Vec<u8>, iterations: u32) -> Self {
        SaltInfo { salt, iterations }
    }
}

/// A `CredentialLookup` finds the salt and iteration count for a given user.
///
/// Closures of the form `Fn(&str) -> Result<SaltInfo, LookupError>` implement this trait.
///
/// Implementors should take care that unknown users aren't distinguishable from known ones by
/// timing or by the returned error, since the result is reported to the caller unchanged.
pub trait CredentialLookup {
    /// Gets the [`SaltInfo`](struct.SaltInfo.html) for the given user.
    fn lookup(&self, username: &str) -> Result<SaltInfo, LookupError>;
}

impl<F> CredentialLookup for F
where
    F: Fn(&str) -> Result<SaltInfo, LookupError>,
{
    fn lookup(&self, username: &str) -> Result<SaltInfo, LookupError> {
        self(username)
    }
}

/// Responds to client authentication challenges.
/// The entrypoint for the SCRAM server side implementation. One value serves exactly one
/// authentication attempt.
#[derive(Debug)]
pub struct ScramServer {
    exchange: Exchange,
}

impl ScramServer {
    /// Create a new ScramServer.
    ///
    /// # Arguments
    ///
    /// * hash - The hash family of the mechanism in use.
    /// * channel_binding - The channel binding the client has to use. A client announcing a
    /// different one fails with `Error::ChannelBindingMismatch`.
    /// * binding_data - The channel binding data of the transport, e.g. the `tls-unique` value.
    /// It is ignored unless `channel_binding` names a concrete binding type.
    pub fn new<D: Into<Vec<u8>>>(hash: HashAlgorithm, channel_binding: ChannelBinding, binding_data: D) -> Self {
        ScramServer {
            exchange: Exchange::new(hash, channel_binding, binding_data.into()),
        }
    }

    /// Create a new ScramServer for a negotiated mechanism. The `-PLUS` variants require a
    /// concrete channel binding, the others require none, otherwise
    /// `Error::IncompatibleChannelBinding` is returned.
    pub fn from_mechanism<D: Into<Vec<u8>>>(
        mechanism: Mechanism,
        channel_binding: ChannelBinding,
        binding_data: D,
    ) -> Result<Self, Error> {
        Ok(ScramServer {
            exchange: Exchange::from_mechanism(mechanism, channel_binding, binding_data.into())?,
        })
    }

    /// Handle the first message sent by the client. If the message is well formed and `lookup`
    /// knows the user, this will progress to the next stage of the authentication process,
    /// [`ServerFirst`](struct.ServerFirst.html). Otherwise, it will return an error.
    ///
    /// # Return value
    ///
    /// * `Error::Malformed` or `Error::Protocol` if the message is invalid.
    /// * `Error::Lookup` with the error of `lookup` as it was returned.
    /// * `Error::Protocol` if the stored iteration count is zero or exceeds
    /// [`MAX_ITERATIONS`](../constant.MAX_ITERATIONS.html), a client would refuse it.
    pub fn handle_client_first<L: CredentialLookup + ?Sized>(
        self,
        client_first: &str,
        lookup: &L,
    ) -> Result<ServerFirst, Error> {
        let header = self.exchange.parse_first(client_first)?;
        let username = header
            .params
            .get(b"n")
            .and_then(|username| std::str::from_utf8(username).ok())
            .ok_or(Kind::InvalidField(Field::Authcid))?
            .to_owned();
        let authzid = if header.authzid.is_empty() {
            None
        } else {
            Some(
                String::from_utf8(header.authzid.clone())
                    .map_err(|_| Kind::InvalidField(Field::Authzid))?,
            )
        };

        let info = lookup.lookup(&username).map_err(Error::Lookup)?;
        let iterations = Some(info.iterations)
            .filter(|&iterations| iterations <= MAX_ITERATIONS)
            .and_then(NonZeroU32::new)
            .ok_or(Kind::InvalidField(Field::Iterations))?;
        debug!(
            %username,
            channel_binding = %header.channel_binding,
            iterations = iterations.get(),
            "received client-first message"
        );
        Ok(ServerFirst {
            exchange: self.exchange,
            header,
            username,
            authzid,
            salt: info.salt,
            iterations,
        })
    }
}

/// Represents the first stage in the authentication process, after the client has
/// submitted their first message. This struct is responsible for responding to the message.
#[derive(Debug)]
pub struct ServerFirst {
    exchange: Exchange,
    header: Gs2Header,
    username: String,
    authzid: Option<String>,
    salt: Vec<u8>,
    iterations: NonZeroU32,
}

impl ServerFirst {
    /// Create the server's first message in response to the client's first message.
    /// This method uses [`OsRng`](https://docs.rs/rand/0.8/rand/rngs/struct.OsRng.html)
    /// as its source of randomness for the nonce. To specify the randomness source, use
    /// [`server_first_with_rng`](#method.server_first_with_rng).
    pub fn server_first(self) -> (ClientFinal, String) {
        self.server_first_with_rng(&mut OsRng)
    }

    /// Create the server's first message in response to the client's first message, with the
    /// given source of randomness used for the server's nonce.
    pub fn server_first_with_rng<R: Rng + CryptoRng>(self, rng: &mut R) -> (ClientFinal, String) {
        let challenge = Challenge::new(generate_nonce(rng), self.salt, self.iterations);
        let server_first = challenge.encode();
        debug!(username = %self.username, "sent server-first message");
        (
            ClientFinal {
                exchange: self.exchange,
                header: self.header,
                username: self.username,
                authzid: self.authzid,
                challenge,
            },
            server_first,
        )
    }

    /// The GS2 header sent by the client.
    pub fn gs2_header(&self) -> &Gs2Header {
        &self.header
    }

    /// The username to authenticate.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The requested authorization identity, if any.
    pub fn authzid(&self) -> Option<&str> {
        self.authzid.as_deref()
    }
}

/// Represents the stage after the server has generated its first response to the client. This
/// struct is responsible for handling the client's final message.
#[derive(Debug)]
pub struct ClientFinal {
    exchange: Exchange,
    header: Gs2Header,
    username: String,
    authzid: Option<String>,
    challenge: Challenge,
}

impl ClientFinal {
    /// Handle the final client message. `salted_password` is the stored password of the user,
    /// derived with [`hash_password`](../fn.hash_password.html) from [`salt`](#method.salt) and
    /// [`iterations`](#method.iterations).
    ///
    /// # Return value
    ///
    /// * `Error::ChannelBindingMismatch` if the client negotiated another channel binding or
    /// sent other binding data. This is checked first.
    /// * `Error::Malformed` or `Error::Protocol` if the message is invalid or carries another
    /// nonce.
    /// * `Error::VerificationFailed` if the proof is missing or wrong.
    pub fn handle_client_final(self, client_final: &str, salted_password: &[u8]) -> Result<ServerFinal, Error> {
        let transcript = self.exchange.verify_client_proof(
            &self.header,
            &self.challenge,
            client_final,
            salted_password,
        )?;
        debug!(username = %self.username, "client proof verified");
        Ok(ServerFinal {
            exchange: self.exchange,
            header: self.header,
            username: self.username,
            authzid: self.authzid,
            transcript,
        })
    }

    /// The salt sent to the client.
    pub fn salt(&self) -> &[u8] {
        &self.challenge.salt
    }

    /// The iteration count sent to the client.
    pub fn iterations(&self) -> NonZeroU32 {
        self.challenge.iterations
    }

    /// The GS2 header sent by the client.
    pub fn gs2_header(&self) -> &Gs2Header {
        &self.header
    }

    /// The username to authenticate.
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Represents the final stage of authentication, after the client's proof was verified.
#[derive(Debug)]
pub struct ServerFinal {
    exchange: Exchange,
    header: Gs2Header,
    username: String,
    authzid: Option<String>,
    transcript: Transcript,
}

impl ServerFinal {
    /// Returns the server-final message carrying the server signature.
    pub fn server_final(self, salted_password: &[u8]) -> String {
        debug!(username = %self.username, "sent server-final message");
        self.exchange
            .build_server_signature(&self.transcript, salted_password)
    }

    /// The GS2 header sent by the client.
    pub fn gs2_header(&self) -> &Gs2Header {
        &self.header
    }

    /// The authenticated username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The requested authorization identity, if any. It is covered by the verified proof unless a
    /// concrete channel binding is in use. Deciding whether the user may act as this identity is up
    /// to the caller.
    pub fn authzid(&self) -> Option<&str> {
        self.authzid.as_deref()
    }
}

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use tracing::debug;

use crate::error::Error;
use crate::exchange::{Challenge, Exchange, Transcript};
use crate::gs2::{ChannelBinding, Gs2Header};
use crate::mechanism::{HashAlgorithm, Mechanism};
use crate::utils::generate_nonce;

/// The initial state of the SCRAM mechanism. It's the entry point for a SCRAM handshake.
#[derive(Debug)]
pub struct ScramClient {
    exchange: Exchange,
}

impl ScramClient {
    /// Constructs an initial state for the SCRAM mechanism.
    ///
    /// # Arguments
    ///
    /// * hash - The hash family of the mechanism in use.
    /// * channel_binding - The channel binding announced in the GS2 header. `ChannelBinding::None`
    /// and `ChannelBinding::Unset` both announce that the client doesn't bind the channel.
    /// * binding_data - The channel binding data of the transport, e.g. the `tls-unique` value.
    /// It is ignored unless `channel_binding` names a concrete binding type.
    pub fn new<D: Into<Vec<u8>>>(hash: HashAlgorithm, channel_binding: ChannelBinding, binding_data: D) -> Self {
        ScramClient {
            exchange: Exchange::new(hash, channel_binding, binding_data.into()),
        }
    }

    /// Constructs an initial state for a negotiated mechanism.
    ///
    /// # Return value
    ///
    /// `Error::IncompatibleChannelBinding` is returned if a `-PLUS` mechanism is combined with no
    /// channel binding or the other way round.
    pub fn from_mechanism<D: Into<Vec<u8>>>(
        mechanism: Mechanism,
        channel_binding: ChannelBinding,
        binding_data: D,
    ) -> Result<Self, Error> {
        Ok(ScramClient {
            exchange: Exchange::from_mechanism(mechanism, channel_binding, binding_data.into())?,
        })
    }

    /// Returns the next state and the first client message. The nonce is drawn from
    /// [`OsRng`](https://docs.rs/rand/0.8/rand/rngs/struct.OsRng.html).
    ///
    /// Call the
    /// [`ServerFirst::handle_server_first`](struct.ServerFirst.html#method.handle_server_first)
    /// method to continue the SCRAM handshake.
    ///
    /// # Arguments
    ///
    /// * authzid - An username used for authorization. This can be used to impersonate as `authzid`
    /// using the credentials of `username`. If `authzid` is `None` the authorized username will be
    /// the same as the authenticated username.
    /// * username - An username used for authentication.
    ///
    /// # Return value
    ///
    /// `Error::Protocol` is returned if `authzid` or `username` contains a `,`.
    pub fn client_first(self, authzid: Option<&str>, username: &str) -> Result<(ServerFirst, String), Error> {
        self.client_first_with_rng(authzid, username, &mut OsRng)
    }

    /// Like [`client_first`](#method.client_first) but with a custom random number generator.
    /// Only cryptographically secure generators are accepted.
    pub fn client_first_with_rng<R: Rng + CryptoRng>(
        self,
        authzid: Option<&str>,
        username: &str,
        rng: &mut R,
    ) -> Result<(ServerFirst, String), Error> {
        let header = self
            .exchange
            .build_first(authzid, username, generate_nonce(rng))?;
        let client_first = header.encode();
        debug!(
            username,
            channel_binding = %self.exchange.channel_binding,
            "sent client-first message"
        );
        Ok((
            ServerFirst {
                exchange: self.exchange,
                header,
            },
            client_first,
        ))
    }
}

/// The second state of the SCRAM mechanism after the first client message was computed.
#[derive(Debug)]
pub struct ServerFirst {
    exchange: Exchange,
    header: Gs2Header,
}

impl ServerFirst {
    /// Processes the first answer from the server and returns the next state or an error. If an
    /// error is returned the SCRAM handshake is aborted.
    ///
    /// Call the [`ClientFinal::client_final`](struct.ClientFinal.html#method.client_final) method
    /// to continue the handshake.
    ///
    /// # Return value
    ///
    /// This method returns only a subset of the errors defined in [`Error`](../enum.Error.html):
    ///
    /// * Error::Malformed
    /// * Error::Protocol
    /// * Error::UnsupportedExtension
    pub fn handle_server_first(self, server_first: &str, password: &str) -> Result<ClientFinal, Error> {
        let (challenge, transcript, client_final) =
            self.exchange.build_final(&self.header, server_first, password)?;
        debug!(iterations = challenge.iterations.get(), "received server-first message");
        Ok(ClientFinal {
            exchange: self.exchange,
            challenge,
            transcript,
            client_final,
        })
    }

    /// The GS2 header sent to the server.
    pub fn gs2_header(&self) -> &Gs2Header {
        &self.header
    }
}

/// The third state of the SCRAM mechanism after the first server message was successfully
/// processed.
#[derive(Debug)]
pub struct ClientFinal {
    exchange: Exchange,
    challenge: Challenge,
    transcript: Transcript,
    client_final: String,
}

impl ClientFinal {
    /// Returns the next state and the final client message.
    ///
    /// Call the
    /// [`ServerFinal::handle_server_final`](struct.ServerFinal.html#method.handle_server_final)
    /// method to continue the SCRAM handshake.
    #[inline]
    pub fn client_final(self) -> (ServerFinal, String) {
        let server_final = ServerFinal {
            exchange: self.exchange,
            challenge: self.challenge,
            transcript: self.transcript,
        };
        (server_final, self.client_final)
    }
}

/// The final state of the SCRAM mechanism after the final client message was computed.
#[derive(Debug)]
pub struct ServerFinal {
    exchange: Exchange,
    challenge: Challenge,
    transcript: Transcript,
}

impl ServerFinal {
    /// Processes the final answer from the server and returns the authentication result.
    ///
    /// # Return value
    ///
    /// * A value of `Ok(())` signals a successful authentication attempt.
    /// * A value of `Err(Error::Malformed { .. })` or `Err(Error::Protocol(_))` means that the
    /// answer couldn't be understood.
    /// * A value of `Err(Error::VerificationFailed)` or `Err(Error::Authentication(_))` means that
    /// the server couldn't prove its knowledge of the password or rejected the request.
    ///
    /// Detailed semantics are documented in the [`Error`](../enum.Error.html) type.
    pub fn handle_server_final(self, server_final: &str, password: &str) -> Result<(), Error> {
        self.exchange
            .verify_server_signature(&self.challenge, &self.transcript, server_final, password)?;
        debug!("server signature verified");
        Ok(())
    }
}

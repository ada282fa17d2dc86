//! The SCRAM engine shared by the client and the server states.
//!
//! Both sides rebuild the `AuthMessage` from the fragments they stored, so a wrong nonce, header or
//! challenge shows up as a failed verification.

use std::num::NonZeroU32;

use tracing::warn;

use crate::error::{Error, Field, Kind};
use crate::gs2::{ChannelBinding, Gs2Header};
use crate::mechanism::{HashAlgorithm, Mechanism};
use crate::params::{Param, Params};
use crate::utils::{client_proof, hash_password, server_signature, verify_proof, verify_signature};
use crate::MAX_ITERATIONS;

/// The three message fragments signed by both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transcript {
    client_first_bare: Vec<u8>,
    server_first: Vec<u8>,
    client_final_without_proof: Vec<u8>,
}

impl Transcript {
    /// `client-first-message-bare "," server-first-message "," client-final-message-without-proof`
    pub(crate) fn auth_message(&self) -> Vec<u8> {
        Params::from(vec![
            Param::key_only(self.client_first_bare.clone()),
            Param::key_only(self.server_first.clone()),
            Param::key_only(self.client_final_without_proof.clone()),
        ])
        .encode()
    }
}

/// The content of a server-first message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Challenge {
    /// The server's contribution to the nonce.
    pub(crate) nonce: Vec<u8>,
    pub(crate) salt: Vec<u8>,
    pub(crate) iterations: NonZeroU32,
    /// The message as it went over the wire, before base64.
    raw: Vec<u8>,
}

impl Challenge {
    pub(crate) fn new(nonce: Vec<u8>, salt: Vec<u8>, iterations: NonZeroU32) -> Self {
        let raw = Params::from(vec![
            Param::new("r", nonce.clone()),
            Param::new("s", base64::encode(&salt)),
            Param::new("i", iterations.to_string()),
        ])
        .encode();
        Challenge {
            nonce,
            salt,
            iterations,
            raw,
        }
    }

    /// Parses the base64 decoded server-first message.
    ///
    /// # Return value
    ///
    /// * `Error::Malformed` if the message isn't a valid parameter list.
    /// * `Error::UnsupportedExtension` if the message starts with a mandatory extension `m=`.
    /// * `Error::Protocol` if one of `r`, `s` or `i` is missing or invalid.
    pub(crate) fn parse(raw: Vec<u8>) -> Result<Self, Error> {
        let params = Params::decode(&raw)?;
        if params.iter().next().map_or(false, |param| param.key == b"m") {
            return Err(Error::UnsupportedExtension);
        }
        let nonce = params
            .get(b"r")
            .ok_or(Kind::ExpectedField(Field::Nonce))?;
        if !is_printable(nonce) {
            return Err(Kind::InvalidField(Field::Nonce).into());
        }
        let salt = params
            .get(b"s")
            .ok_or(Kind::ExpectedField(Field::Salt))?;
        let salt = base64::decode(salt).map_err(|_| Kind::InvalidField(Field::Salt))?;
        let iterations = params
            .get(b"i")
            .ok_or(Kind::ExpectedField(Field::Iterations))?;
        let iterations = parse_iterations(iterations)?;
        Ok(Challenge {
            nonce: nonce.to_vec(),
            salt,
            iterations,
            raw,
        })
    }

    /// The base64 encoded message.
    pub(crate) fn encode(&self) -> String {
        base64::encode(&self.raw)
    }
}

/// Nonces are non-empty printable ASCII, `,` can't occur after decoding.
fn is_printable(nonce: &[u8]) -> bool {
    !nonce.is_empty() && nonce.iter().all(u8::is_ascii_graphic)
}

/// A positive decimal count of at most `MAX_ITERATIONS`.
fn parse_iterations(value: &[u8]) -> Result<NonZeroU32, Error> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(Kind::InvalidField(Field::Iterations).into());
    }
    std::str::from_utf8(value)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|&iterations| iterations <= MAX_ITERATIONS)
        .and_then(NonZeroU32::new)
        .ok_or_else(|| Kind::InvalidField(Field::Iterations).into())
}

/// The configuration and message logic of one exchange.
#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub(crate) hash: HashAlgorithm,
    pub(crate) channel_binding: ChannelBinding,
    pub(crate) binding_data: Vec<u8>,
}

impl Exchange {
    pub(crate) fn new(hash: HashAlgorithm, channel_binding: ChannelBinding, binding_data: Vec<u8>) -> Self {
        Exchange {
            hash,
            channel_binding,
            binding_data,
        }
    }

    /// Only the `-PLUS` mechanisms may bind the channel, and they have to.
    pub(crate) fn from_mechanism(
        mechanism: Mechanism,
        channel_binding: ChannelBinding,
        binding_data: Vec<u8>,
    ) -> Result<Self, Error> {
        if mechanism.requires_channel_binding() != channel_binding.is_bound() {
            return Err(Error::IncompatibleChannelBinding {
                mechanism,
                channel_binding,
            });
        }
        Ok(Exchange::new(mechanism.hash(), channel_binding, binding_data))
    }

    /// Builds the header of the client-first message. Values containing `,` can't be carried and
    /// are rejected.
    pub(crate) fn build_first(
        &self,
        authzid: Option<&str>,
        username: &str,
        nonce: Vec<u8>,
    ) -> Result<Gs2Header, Error> {
        if username.contains(',') {
            return Err(Kind::InvalidField(Field::Authcid).into());
        }
        let authzid = authzid.unwrap_or_default();
        if authzid.contains(',') {
            return Err(Kind::InvalidField(Field::Authzid).into());
        }
        let params = Params::from(vec![Param::new("n", username), Param::new("r", nonce)]);
        Ok(Gs2Header::new(self.channel_binding, authzid, params))
    }

    /// Processes the base64 encoded server-first message and computes the client-final message.
    pub(crate) fn build_final(
        &self,
        header: &Gs2Header,
        server_first: &str,
        password: &str,
    ) -> Result<(Challenge, Transcript, String), Error> {
        let raw = base64::decode(server_first).map_err(|_| Kind::InvalidField(Field::Challenge))?;
        let challenge = Challenge::parse(raw)?;
        let transcript = self.transcript(header, &challenge)?;

        let salted_password = hash_password(self.hash, password, challenge.iterations, &challenge.salt);
        let proof = client_proof(self.hash, &salted_password, &transcript.auth_message());

        let mut message = transcript.client_final_without_proof.clone();
        message.extend_from_slice(b",p=");
        message.extend_from_slice(base64::encode(&proof).as_bytes());
        // Only ASCII went into the message.
        let message = String::from_utf8(message).map_err(|_| Kind::InvalidField(Field::Nonce))?;
        Ok((challenge, transcript, message))
    }

    /// Checks the server-final message against the signature derived from `password`.
    pub(crate) fn verify_server_signature(
        &self,
        challenge: &Challenge,
        transcript: &Transcript,
        server_final: &str,
        password: &str,
    ) -> Result<(), Error> {
        let params = Params::decode(server_final.as_bytes())?;
        if let Some(message) = params.get(b"e") {
            return Err(Error::Authentication(String::from_utf8_lossy(message).into_owned()));
        }
        let verifier = params
            .get(b"v")
            .ok_or(Kind::ExpectedField(Field::VerifyOrError))?;
        let verifier = base64::decode(verifier).map_err(|_| Kind::InvalidField(Field::VerifyOrError))?;

        let salted_password = hash_password(self.hash, password, challenge.iterations, &challenge.salt);
        let expected = server_signature(self.hash, &salted_password, &transcript.auth_message());
        if verify_signature(&expected, &verifier) {
            Ok(())
        } else {
            warn!("server signature mismatch");
            Err(Error::VerificationFailed)
        }
    }

    /// Decodes a client-first message, requiring a username and a nonce.
    pub(crate) fn parse_first(&self, client_first: &str) -> Result<Gs2Header, Error> {
        let header = Gs2Header::decode(client_first.as_bytes())?;
        let username = header
            .params
            .get(b"n")
            .ok_or(Kind::ExpectedField(Field::Authcid))?;
        if std::str::from_utf8(username).is_err() {
            return Err(Kind::InvalidField(Field::Authcid).into());
        }
        match header.params.get(b"r") {
            None => return Err(Kind::ExpectedField(Field::Nonce).into()),
            Some(nonce) if !is_printable(nonce) => return Err(Kind::InvalidField(Field::Nonce).into()),
            Some(_) => {}
        }
        Ok(header)
    }

    /// Checks the client-final message and its proof against `salted_password`.
    ///
    /// # Return value
    ///
    /// * `Error::ChannelBindingMismatch` if the binding in the client's header or its `c=`
    /// attribute differs from ours. This is checked before anything else.
    /// * `Error::Protocol` if `c` or `r` is missing, or `r` isn't the nonce of this exchange.
    /// * `Error::VerificationFailed` if the proof is missing, undecodable or wrong.
    pub(crate) fn verify_client_proof(
        &self,
        header: &Gs2Header,
        challenge: &Challenge,
        client_final: &str,
        salted_password: &[u8],
    ) -> Result<Transcript, Error> {
        if header.channel_binding != self.channel_binding {
            warn!(
                expected = %self.channel_binding,
                received = %header.channel_binding,
                "channel binding mismatch"
            );
            return Err(Error::ChannelBindingMismatch);
        }
        let params = Params::decode(client_final.as_bytes())?;

        let binding = params
            .get(b"c")
            .ok_or(Kind::ExpectedField(Field::ChannelBinding))?;
        if binding != header.binding_payload(&self.binding_data).as_bytes() {
            warn!("channel binding data mismatch");
            return Err(Error::ChannelBindingMismatch);
        }
        let nonce = params
            .get(b"r")
            .ok_or(Kind::ExpectedField(Field::Nonce))?;
        if nonce != &full_nonce(header, challenge)?[..] {
            return Err(Kind::InvalidNonce.into());
        }

        let transcript = self.transcript(header, challenge)?;
        let proof = params
            .get(b"p")
            .and_then(|proof| base64::decode(proof).ok())
            .unwrap_or_default();
        if verify_proof(self.hash, salted_password, &transcript.auth_message(), &proof) {
            Ok(transcript)
        } else {
            warn!("client proof mismatch");
            Err(Error::VerificationFailed)
        }
    }

    /// Builds the server-final message `v=<signature>`.
    pub(crate) fn build_server_signature(&self, transcript: &Transcript, salted_password: &[u8]) -> String {
        let signature = server_signature(self.hash, salted_password, &transcript.auth_message());
        let params = Params::from(vec![Param::new("v", base64::encode(&signature))]);
        String::from_utf8_lossy(&params.encode()).into_owned()
    }

    fn transcript(&self, header: &Gs2Header, challenge: &Challenge) -> Result<Transcript, Error> {
        let client_first_bare = client_first_bare(header)?;
        let mut client_final_without_proof = b"c=".to_vec();
        let payload = header.binding_payload(&self.binding_data);
        client_final_without_proof.extend_from_slice(payload.as_bytes());
        client_final_without_proof.extend_from_slice(b",r=");
        client_final_without_proof.extend_from_slice(&full_nonce(header, challenge)?);
        Ok(Transcript {
            client_first_bare,
            server_first: challenge.raw.clone(),
            client_final_without_proof,
        })
    }
}

/// `n=<username>,r=<client nonce>`
fn client_first_bare(header: &Gs2Header) -> Result<Vec<u8>, Error> {
    let username = header
        .params
        .get(b"n")
        .ok_or(Kind::ExpectedField(Field::Authcid))?;
    let nonce = header
        .params
        .get(b"r")
        .ok_or(Kind::ExpectedField(Field::Nonce))?;
    let mut bare = b"n=".to_vec();
    bare.extend_from_slice(username);
    bare.extend_from_slice(b",r=");
    bare.extend_from_slice(nonce);
    Ok(bare)
}

/// The client's nonce followed by the server's.
fn full_nonce(header: &Gs2Header, challenge: &Challenge) -> Result<Vec<u8>, Error> {
    let client_nonce = header
        .params
        .get(b"r")
        .ok_or(Kind::ExpectedField(Field::Nonce))?;
    let mut nonce = client_nonce.to_vec();
    nonce.extend_from_slice(&challenge.nonce);
    Ok(nonce)
}

//! The GS2 header carried by the client-first message.
//!
//! ```text
//! gs2-cb-flag = ("p=" cb-name) / "n" / "y"
//! gs2-header  = gs2-cb-flag "," [gs2-authzid] ","
//! ```
//!
//! The SCRAM attributes following the header ride along as trailing entries and the whole
//! message is base64 encoded.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Field, Kind};
use crate::params::{Param, Params};

/// The channel binding a client negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelBinding {
    /// Nothing has been negotiated yet. Encodes like `None`.
    Unset,
    /// The client doesn't use channel binding.
    None,
    /// `tls-unique` (RFC 5929).
    TlsUnique,
    /// `tls-server-end-point` (RFC 5929).
    TlsServerEndPoint,
    /// `tls-unique-for-telnet` (RFC 5929).
    TlsUniqueForTelnet,
}

impl Default for ChannelBinding {
    fn default() -> Self {
        ChannelBinding::Unset
    }
}

impl ChannelBinding {
    /// The `cb-name` of a concrete channel binding type.
    pub fn name(self) -> Option<&'static str> {
        match self {
            ChannelBinding::TlsUnique => Some("tls-unique"),
            ChannelBinding::TlsServerEndPoint => Some("tls-server-end-point"),
            ChannelBinding::TlsUniqueForTelnet => Some("tls-unique-for-telnet"),
            ChannelBinding::Unset | ChannelBinding::None => None,
        }
    }

    /// Returns `true` if channel binding data is bound into the exchange.
    pub fn is_bound(self) -> bool {
        self.name().is_some()
    }

    fn flag(self) -> Param {
        match self.name() {
            Some(name) => Param::new("p", name),
            None => Param::key_only("n"),
        }
    }
}

impl FromStr for ChannelBinding {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "tls-unique" => Ok(ChannelBinding::TlsUnique),
            "tls-server-end-point" => Ok(ChannelBinding::TlsServerEndPoint),
            "tls-unique-for-telnet" => Ok(ChannelBinding::TlsUniqueForTelnet),
            _ => Err(Error::Protocol(Kind::InvalidField(Field::ChannelBinding))),
        }
    }
}

impl fmt::Display for ChannelBinding {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ChannelBinding::Unset => fmt.write_str("unset"),
            ChannelBinding::None => fmt.write_str("none"),
            other => fmt.write_str(other.name().unwrap_or_default()),
        }
    }
}

/// A decoded GS2 header together with the SCRAM attributes following it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gs2Header {
    /// The negotiated channel binding.
    pub channel_binding: ChannelBinding,
    /// The authorization identity, empty if the client acts as itself.
    pub authzid: Vec<u8>,
    /// The entries after the header, i.e. `n=` and `r=` for SCRAM.
    pub params: Params,
}

impl Gs2Header {
    /// Creates a header.
    pub fn new<A: Into<Vec<u8>>>(channel_binding: ChannelBinding, authzid: A, params: Params) -> Self {
        Gs2Header {
            channel_binding,
            authzid: authzid.into(),
            params,
        }
    }

    /// Returns the header and its trailing entries as a base64 string.
    pub fn encode(&self) -> String {
        let mut params = self.flag_and_authzid();
        params.extend(self.params.iter().cloned());
        base64::encode(params.encode())
    }

    /// The value of the `c=` attribute of the client-final message.
    ///
    /// Without channel binding this is the base64 encoded `gs2-header`, so the authzid is signed
    /// along with the rest of the exchange. It is `biws` (`n,,`) if no authzid was requested. With
    /// a concrete binding it is the base64 encoded binding data.
    pub(crate) fn binding_payload(&self, data: &[u8]) -> String {
        if self.channel_binding.is_bound() {
            base64::encode(data)
        } else {
            let mut params = self.flag_and_authzid();
            params.push(Param::default());
            base64::encode(params.encode())
        }
    }

    fn flag_and_authzid(&self) -> Params {
        let mut params = Params::new();
        params.push(self.channel_binding.flag());
        if self.authzid.is_empty() {
            params.push(Param::default());
        } else {
            params.push(Param::new("a", self.authzid.clone()));
        }
        params
    }

    /// Decodes a base64 encoded header.
    ///
    /// `y` is accepted and treated like `n`. The key of the authzid slot isn't checked.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let raw = base64::decode(data)
            .map_err(|_| Error::Protocol(Kind::InvalidField(Field::GS2Header)))?;
        let params = Params::decode(&raw)?;
        if params.len() < 2 {
            return Err(Error::Protocol(Kind::ExpectedField(Field::GS2Header)));
        }
        let entries = params.as_slice();
        let channel_binding = match &entries[0].key[..] {
            b"p" => std::str::from_utf8(&entries[0].value)
                .map_err(|_| Error::Protocol(Kind::InvalidField(Field::ChannelBinding)))?
                .parse::<ChannelBinding>()?,
            b"n" | b"y" => ChannelBinding::None,
            _ => return Err(Error::Protocol(Kind::InvalidField(Field::ChannelBinding))),
        };
        Ok(Gs2Header {
            channel_binding,
            authzid: entries[1].value.clone(),
            params: entries[2..].to_vec().into(),
        })
    }
}

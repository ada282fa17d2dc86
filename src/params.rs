//! The comma separated `key[=value]` format shared by the SCRAM and GS2 messages.
//!
//! Keys are made of `[a-z_-]`. Values may hold any byte except `,`, no escaping is performed.

use std::io;
use std::slice;

use crate::error::Error;

/// A single `key[=value]` entry. An empty value is written as the bare key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param {
    /// The entry's key, possibly empty.
    pub key: Vec<u8>,
    /// The entry's value, possibly empty.
    pub value: Vec<u8>,
}

impl Param {
    /// Creates an entry from a key and a value.
    pub fn new<K: Into<Vec<u8>>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        Param {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates an entry consisting of a key only.
    pub fn key_only<K: Into<Vec<u8>>>(key: K) -> Self {
        Param {
            key: key.into(),
            value: Vec::new(),
        }
    }
}

/// An ordered list of [`Param`](struct.Param.html)s.
///
/// The order is kept as inserted since messages are signed as they appear on the wire. Duplicate
/// keys are allowed, lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    params: Vec<Param>,
}

#[derive(Clone, Copy)]
enum State {
    Key,
    Value,
}

impl Params {
    /// Creates an empty list.
    pub fn new() -> Self {
        Params { params: Vec::new() }
    }

    /// Returns the value of the first entry with the key `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.params
            .iter()
            .find(|param| param.key == key)
            .map(|param| param.value.as_slice())
    }

    /// Appends an entry.
    pub fn push(&mut self, param: Param) {
        self.params.push(param);
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> slice::Iter<'_, Param> {
        self.params.iter()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The entries as a slice.
    pub fn as_slice(&self) -> &[Param] {
        &self.params
    }

    /// Joins the entries with `,`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            out.extend_from_slice(&param.key);
            if !param.value.is_empty() {
                out.push(b'=');
                out.extend_from_slice(&param.value);
            }
        }
        out
    }

    /// Writes the encoded entries to `writer`.
    pub fn encode_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.encode())
    }

    /// Parses `data` into a list of entries.
    ///
    /// The last entry is always flushed at the end of the input, so an empty input yields one
    /// empty entry and a trailing `,` yields a trailing empty entry.
    ///
    /// # Return value
    ///
    /// `Error::Malformed` is returned for a byte outside of `[a-z_-]` in a key position, with `=`
    /// and `,` being the only exceptions.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let mut params = Params::new();
        let mut state = State::Key;
        let mut current = Param::default();
        for (offset, &byte) in data.iter().enumerate() {
            match (state, byte) {
                (_, b',') => {
                    params.push(std::mem::take(&mut current));
                    state = State::Key;
                }
                (State::Key, b'=') => state = State::Value,
                (State::Key, b'a'..=b'z') | (State::Key, b'_') | (State::Key, b'-') => {
                    current.key.push(byte)
                }
                (State::Key, _) => return Err(Error::Malformed { byte, offset }),
                (State::Value, _) => current.value.push(byte),
            }
        }
        params.push(current);
        Ok(params)
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Params { params }
    }
}

impl Extend<Param> for Params {
    fn extend<I: IntoIterator<Item = Param>>(&mut self, iter: I) {
        self.params.extend(iter)
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

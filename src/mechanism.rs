//! Hash families usable by the engine and the SASL mechanism names mapping onto them.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use ring::{digest as ring_digest, hmac as ring_hmac, pbkdf2 as ring_pbkdf2};
use sha2::{Digest, Sha224};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};

use crate::error::Error;

pub const SCRAM_SHA_1: &str = "SCRAM-SHA-1";
pub const SCRAM_SHA_1_PLUS: &str = "SCRAM-SHA-1-PLUS";
pub const SCRAM_SHA_224: &str = "SCRAM-SHA-224";
pub const SCRAM_SHA_224_PLUS: &str = "SCRAM-SHA-224-PLUS";
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";
pub const SCRAM_SHA_256_PLUS: &str = "SCRAM-SHA-256-PLUS";
pub const SCRAM_SHA_384: &str = "SCRAM-SHA-384";
pub const SCRAM_SHA_384_PLUS: &str = "SCRAM-SHA-384-PLUS";
pub const SCRAM_SHA_512: &str = "SCRAM-SHA-512";
pub const SCRAM_SHA_512_PLUS: &str = "SCRAM-SHA-512-PLUS";
pub const SCRAM_SHA3_224: &str = "SCRAM-SHA3-224";
pub const SCRAM_SHA3_224_PLUS: &str = "SCRAM-SHA3-224-PLUS";
pub const SCRAM_SHA3_256: &str = "SCRAM-SHA3-256";
pub const SCRAM_SHA3_256_PLUS: &str = "SCRAM-SHA3-256-PLUS";
pub const SCRAM_SHA3_384: &str = "SCRAM-SHA3-384";
pub const SCRAM_SHA3_384_PLUS: &str = "SCRAM-SHA3-384-PLUS";
pub const SCRAM_SHA3_512: &str = "SCRAM-SHA3-512";
pub const SCRAM_SHA3_512_PLUS: &str = "SCRAM-SHA3-512-PLUS";

/// The mechanisms this crate implements, strongest first.
pub const MECHANISMS: &[&str] = &[
    SCRAM_SHA3_512_PLUS,
    SCRAM_SHA3_512,
    SCRAM_SHA_512_PLUS,
    SCRAM_SHA_512,
    SCRAM_SHA3_384_PLUS,
    SCRAM_SHA3_384,
    SCRAM_SHA_384_PLUS,
    SCRAM_SHA_384,
    SCRAM_SHA3_256_PLUS,
    SCRAM_SHA3_256,
    SCRAM_SHA_256_PLUS,
    SCRAM_SHA_256,
    SCRAM_SHA3_224_PLUS,
    SCRAM_SHA3_224,
    SCRAM_SHA_224_PLUS,
    SCRAM_SHA_224,
    SCRAM_SHA_1_PLUS,
    SCRAM_SHA_1,
];

/// A hash family together with its HMAC and PBKDF2 bindings.
///
/// ring computes SHA-1, SHA-256, SHA-384 and SHA-512. SHA-224 and the SHA-3 family, which ring
/// lacks, come from the RustCrypto hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1, for legacy peers only.
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// SHA3-224
    Sha3_224,
    /// SHA3-256
    Sha3_256,
    /// SHA3-384
    Sha3_384,
    /// SHA3-512
    Sha3_512,
}

impl HashAlgorithm {
    /// The size of a digest in bytes. Every derived key has this size.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 | HashAlgorithm::Sha3_224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha3_384 => 48,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => 64,
        }
    }

    /// `H(data)`
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => ring_hash(&ring_digest::SHA1_FOR_LEGACY_USE_ONLY, data),
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => ring_hash(&ring_digest::SHA256, data),
            HashAlgorithm::Sha384 => ring_hash(&ring_digest::SHA384, data),
            HashAlgorithm::Sha512 => ring_hash(&ring_digest::SHA512, data),
            HashAlgorithm::Sha3_224 => Sha3_224::digest(data).to_vec(),
            HashAlgorithm::Sha3_256 => Sha3_256::digest(data).to_vec(),
            HashAlgorithm::Sha3_384 => Sha3_384::digest(data).to_vec(),
            HashAlgorithm::Sha3_512 => Sha3_512::digest(data).to_vec(),
        }
    }

    /// `HMAC(key, part_1 || part_2 || ...)`
    pub fn hmac(self, key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => ring_mac(ring_hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key, parts),
            HashAlgorithm::Sha224 => mac::<Hmac<Sha224>>(key, parts),
            HashAlgorithm::Sha256 => ring_mac(ring_hmac::HMAC_SHA256, key, parts),
            HashAlgorithm::Sha384 => ring_mac(ring_hmac::HMAC_SHA384, key, parts),
            HashAlgorithm::Sha512 => ring_mac(ring_hmac::HMAC_SHA512, key, parts),
            HashAlgorithm::Sha3_224 => mac::<Hmac<Sha3_224>>(key, parts),
            HashAlgorithm::Sha3_256 => mac::<Hmac<Sha3_256>>(key, parts),
            HashAlgorithm::Sha3_384 => mac::<Hmac<Sha3_384>>(key, parts),
            HashAlgorithm::Sha3_512 => mac::<Hmac<Sha3_512>>(key, parts),
        }
    }

    /// `Hi(password, salt, iterations)`, i.e. PBKDF2 with an output of one digest.
    pub fn pbkdf2(self, password: &[u8], salt: &[u8], iterations: NonZeroU32) -> Vec<u8> {
        let mut out = vec![0u8; self.output_len()];
        let rounds = iterations.get();
        match self {
            HashAlgorithm::Sha1 => {
                ring_pbkdf2::derive(ring_pbkdf2::PBKDF2_HMAC_SHA1, iterations, salt, password, &mut out)
            }
            HashAlgorithm::Sha224 => pbkdf2_hmac::<Sha224>(password, salt, rounds, &mut out),
            HashAlgorithm::Sha256 => {
                ring_pbkdf2::derive(ring_pbkdf2::PBKDF2_HMAC_SHA256, iterations, salt, password, &mut out)
            }
            HashAlgorithm::Sha384 => {
                ring_pbkdf2::derive(ring_pbkdf2::PBKDF2_HMAC_SHA384, iterations, salt, password, &mut out)
            }
            HashAlgorithm::Sha512 => {
                ring_pbkdf2::derive(ring_pbkdf2::PBKDF2_HMAC_SHA512, iterations, salt, password, &mut out)
            }
            HashAlgorithm::Sha3_224 => pbkdf2_hmac::<Sha3_224>(password, salt, rounds, &mut out),
            HashAlgorithm::Sha3_256 => pbkdf2_hmac::<Sha3_256>(password, salt, rounds, &mut out),
            HashAlgorithm::Sha3_384 => pbkdf2_hmac::<Sha3_384>(password, salt, rounds, &mut out),
            HashAlgorithm::Sha3_512 => pbkdf2_hmac::<Sha3_512>(password, salt, rounds, &mut out),
        }
        out
    }
}

fn ring_hash(algorithm: &'static ring_digest::Algorithm, data: &[u8]) -> Vec<u8> {
    ring_digest::digest(algorithm, data).as_ref().to_vec()
}

fn ring_mac(algorithm: ring_hmac::Algorithm, key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let key = ring_hmac::Key::new(algorithm, key);
    let mut context = ring_hmac::Context::with_key(&key);
    for part in parts {
        context.update(part);
    }
    context.sign().as_ref().to_vec()
}

fn mac<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = <M as KeyInit>::new_from_slice(key).expect("HMAC is able to accept all key sizes");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// A SCRAM mechanism as named in the SASL mechanism registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mechanism {
    hash: HashAlgorithm,
    plus: bool,
}

impl Mechanism {
    /// Creates a mechanism from its parts.
    pub fn new(hash: HashAlgorithm, plus: bool) -> Self {
        Mechanism { hash, plus }
    }

    /// The hash family.
    pub fn hash(self) -> HashAlgorithm {
        self.hash
    }

    /// Returns `true` for the `-PLUS` variants which require channel binding.
    pub fn requires_channel_binding(self) -> bool {
        self.plus
    }

    /// The registered name, e.g. `SCRAM-SHA-256-PLUS`.
    pub fn name(self) -> &'static str {
        match (self.hash, self.plus) {
            (HashAlgorithm::Sha1, false) => SCRAM_SHA_1,
            (HashAlgorithm::Sha1, true) => SCRAM_SHA_1_PLUS,
            (HashAlgorithm::Sha224, false) => SCRAM_SHA_224,
            (HashAlgorithm::Sha224, true) => SCRAM_SHA_224_PLUS,
            (HashAlgorithm::Sha256, false) => SCRAM_SHA_256,
            (HashAlgorithm::Sha256, true) => SCRAM_SHA_256_PLUS,
            (HashAlgorithm::Sha384, false) => SCRAM_SHA_384,
            (HashAlgorithm::Sha384, true) => SCRAM_SHA_384_PLUS,
            (HashAlgorithm::Sha512, false) => SCRAM_SHA_512,
            (HashAlgorithm::Sha512, true) => SCRAM_SHA_512_PLUS,
            (HashAlgorithm::Sha3_224, false) => SCRAM_SHA3_224,
            (HashAlgorithm::Sha3_224, true) => SCRAM_SHA3_224_PLUS,
            (HashAlgorithm::Sha3_256, false) => SCRAM_SHA3_256,
            (HashAlgorithm::Sha3_256, true) => SCRAM_SHA3_256_PLUS,
            (HashAlgorithm::Sha3_384, false) => SCRAM_SHA3_384,
            (HashAlgorithm::Sha3_384, true) => SCRAM_SHA3_384_PLUS,
            (HashAlgorithm::Sha3_512, false) => SCRAM_SHA3_512,
            (HashAlgorithm::Sha3_512, true) => SCRAM_SHA3_512_PLUS,
        }
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    /// Parses a mechanism name. Names are case sensitive.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let (base, plus) = match name.strip_suffix("-PLUS") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let hash = match base {
            SCRAM_SHA_1 => HashAlgorithm::Sha1,
            SCRAM_SHA_224 => HashAlgorithm::Sha224,
            SCRAM_SHA_256 => HashAlgorithm::Sha256,
            SCRAM_SHA_384 => HashAlgorithm::Sha384,
            SCRAM_SHA_512 => HashAlgorithm::Sha512,
            SCRAM_SHA3_224 => HashAlgorithm::Sha3_224,
            SCRAM_SHA3_256 => HashAlgorithm::Sha3_256,
            SCRAM_SHA3_384 => HashAlgorithm::Sha3_384,
            SCRAM_SHA3_512 => HashAlgorithm::Sha3_512,
            _ => return Err(Error::UnsupportedMechanism(name.to_owned())),
        };
        Ok(Mechanism { hash, plus })
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

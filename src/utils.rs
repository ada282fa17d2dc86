use std::num::NonZeroU32;

use rand::distributions::Alphanumeric;
use rand::{CryptoRng, Rng};
use ring::constant_time::verify_slices_are_equal;

use crate::mechanism::HashAlgorithm;
use crate::NONCE_LENGTH;

const CLIENT_KEY: &[u8] = b"Client Key";
const SERVER_KEY: &[u8] = b"Server Key";

/// Hashes a password with the given salt and number of iterations. The result is the
/// `SaltedPassword` of RFC 5802, the server passes it to
/// [`ClientFinal::handle_client_final`](server/struct.ClientFinal.html#method.handle_client_final)
/// and [`ServerFinal::server_final`](server/struct.ServerFinal.html#method.server_final).
pub fn hash_password(
    hash: HashAlgorithm,
    password: &str,
    iterations: NonZeroU32,
    salt: &[u8],
) -> Vec<u8> {
    hash.pbkdf2(password.as_bytes(), salt, iterations)
}

/// Draws a nonce of `NONCE_LENGTH` alphanumeric characters.
pub(crate) fn generate_nonce<R: Rng + CryptoRng>(rng: &mut R) -> Vec<u8> {
    (0..NONCE_LENGTH).map(|_| rng.sample(Alphanumeric)).collect()
}

/// `ClientKey XOR HMAC(H(ClientKey), AuthMessage)`
pub(crate) fn client_proof(hash: HashAlgorithm, salted_password: &[u8], auth_message: &[u8]) -> Vec<u8> {
    let client_key = hash.hmac(salted_password, &[CLIENT_KEY]);
    let stored_key = hash.digest(&client_key);
    let client_signature = hash.hmac(&stored_key, &[auth_message]);
    xor(&client_key, &client_signature)
}

/// `HMAC(HMAC(SaltedPassword, "Server Key"), AuthMessage)`
pub(crate) fn server_signature(hash: HashAlgorithm, salted_password: &[u8], auth_message: &[u8]) -> Vec<u8> {
    let server_key = hash.hmac(salted_password, &[SERVER_KEY]);
    hash.hmac(&server_key, &[auth_message])
}

/// Checks a client proof against the salted password.
///
/// The proof is `ClientKey XOR ClientSignature`, so xoring it with the signature again restores the
/// client's key. Its hash has to be our `StoredKey`.
pub(crate) fn verify_proof(
    hash: HashAlgorithm,
    salted_password: &[u8],
    auth_message: &[u8],
    proof: &[u8],
) -> bool {
    let client_key = hash.hmac(salted_password, &[CLIENT_KEY]);
    let stored_key = hash.digest(&client_key);
    let client_signature = hash.hmac(&stored_key, &[auth_message]);
    // A proof of the wrong size takes the same path and fails below, it is never xored partially.
    let well_formed = proof.len() == hash.output_len();
    let proof = if well_formed {
        proof.to_vec()
    } else {
        vec![0u8; hash.output_len()]
    };
    let attempted = hash.digest(&xor(&proof, &client_signature));
    verify_slices_are_equal(&attempted, &stored_key).is_ok() && well_formed
}

/// Constant time comparison of a received server signature.
pub(crate) fn verify_signature(expected: &[u8], received: &[u8]) -> bool {
    verify_slices_are_equal(expected, received).is_ok()
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

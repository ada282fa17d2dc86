use std::num::NonZeroU32;

use rand::rngs::StdRng;
use rand::SeedableRng;
use scram_gs2::*;

struct TestProvider {
    hash: HashAlgorithm,
}

impl TestProvider {
    pub fn new(hash: HashAlgorithm) -> Self {
        TestProvider { hash }
    }

    fn salted_password(&self, password: &str, username: &str) -> Vec<u8> {
        let (salt, iterations) = match username {
            "admin" => (&b"messy"[..], 8192),
            _ => (&b"salt"[..], 4096),
        };
        hash_password(self.hash, password, NonZeroU32::new(iterations).unwrap(), salt)
    }
}

impl CredentialLookup for TestProvider {
    fn lookup(&self, username: &str) -> Result<SaltInfo, LookupError> {
        match username {
            "user" => Ok(SaltInfo::new(b"salt".to_vec(), 4096)),
            "admin" => Ok(SaltInfo::new(b"messy".to_vec(), 8192)),
            _ => Err(format!("no such user '{}'", username).into()),
        }
    }
}

/// Runs a complete exchange and returns the outcome on each side.
fn exchange(
    client: ScramClient,
    server: ScramServer,
    username: &str,
    password: &str,
) -> (Result<(), Error>, Result<(), Error>) {
    let provider = TestProvider::new(HashAlgorithm::Sha256);
    exchange_with(client, server, &provider, username, password, "password")
}

fn exchange_with(
    client: ScramClient,
    server: ScramServer,
    provider: &TestProvider,
    username: &str,
    client_password: &str,
    server_password: &str,
) -> (Result<(), Error>, Result<(), Error>) {
    let (scram_client, client_first) = client.client_first(None, username).unwrap();

    let scram_server = server.handle_client_first(&client_first, provider).unwrap();
    let (scram_server, server_first) = scram_server.server_first();

    let scram_client = scram_client.handle_server_first(&server_first, client_password).unwrap();
    let (scram_client, client_final) = scram_client.client_final();

    let salted_password = provider.salted_password(server_password, username);
    match scram_server.handle_client_final(&client_final, &salted_password) {
        Ok(scram_server) => {
            let server_final = scram_server.server_final(&salted_password);
            (
                scram_client.handle_server_final(&server_final, client_password),
                Ok(()),
            )
        }
        Err(e) => (Ok(()), Err(e)),
    }
}

#[test]
fn test_simple_success() {
    for name in MECHANISMS.iter().filter(|name| !name.ends_with("-PLUS")) {
        let hash = name.parse::<Mechanism>().unwrap().hash();
        let provider = TestProvider::new(hash);
        let client = ScramClient::new(hash, ChannelBinding::None, Vec::new());
        let server = ScramServer::new(hash, ChannelBinding::None, Vec::new());
        let (client_result, server_result) =
            exchange_with(client, server, &provider, "user", "password", "password");
        server_result.unwrap();
        client_result.unwrap();
    }
}

#[test]
fn test_bad_password() {
    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, server_result) = exchange(client, server, "user", "passwore");
    assert!(matches!(server_result, Err(Error::VerificationFailed)));
}

#[test]
fn test_empty_password() {
    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, server_result) = exchange(client, server, "user", "");
    assert!(matches!(server_result, Err(Error::VerificationFailed)));
}

#[test]
fn test_tls_unique_success() {
    let data = b"tls-finished-message".to_vec();
    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::TlsUnique, data.clone());
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::TlsUnique, data);
    let (client_result, server_result) = exchange(client, server, "user", "password");
    server_result.unwrap();
    client_result.unwrap();
}

#[test]
fn test_tls_unique_data_mismatch() {
    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::TlsUnique, &b"client side"[..]);
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::TlsUnique, &b"server side"[..]);
    let (_, server_result) = exchange(client, server, "user", "password");
    assert!(matches!(server_result, Err(Error::ChannelBindingMismatch)));
}

#[test]
fn test_channel_binding_downgrade() {
    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::TlsUnique, &b"data"[..]);
    let (_, server_result) = exchange(client, server, "user", "password");
    assert!(matches!(server_result, Err(Error::ChannelBindingMismatch)));

    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::TlsUnique, &b"data"[..]);
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, server_result) = exchange(client, server, "user", "password");
    assert!(matches!(server_result, Err(Error::ChannelBindingMismatch)));
}

#[test]
fn test_channel_binding_checked_before_proof() {
    let client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::TlsServerEndPoint, &b"x"[..]);
    // Even with a wrong password the binding is what gets reported.
    let (_, server_result) = exchange(client, server, "user", "wrong");
    assert!(matches!(server_result, Err(Error::ChannelBindingMismatch)));
}

#[test]
fn test_from_mechanism() {
    let mechanism: Mechanism = SCRAM_SHA_512_PLUS.parse().unwrap();
    let client = ScramClient::from_mechanism(mechanism, ChannelBinding::TlsUnique, &b"cb"[..]).unwrap();
    let server = ScramServer::from_mechanism(mechanism, ChannelBinding::TlsUnique, &b"cb"[..]).unwrap();
    let provider = TestProvider::new(HashAlgorithm::Sha512);
    let (client_result, server_result) =
        exchange_with(client, server, &provider, "admin", "admin_password", "admin_password");
    server_result.unwrap();
    client_result.unwrap();

    assert!(matches!(
        ScramClient::from_mechanism(mechanism, ChannelBinding::None, Vec::new()),
        Err(Error::IncompatibleChannelBinding { channel_binding: ChannelBinding::None, .. })
    ));
    let plain: Mechanism = SCRAM_SHA_256.parse().unwrap();
    assert!(matches!(
        ScramServer::from_mechanism(plain, ChannelBinding::TlsUnique, &b"cb"[..]),
        Err(Error::IncompatibleChannelBinding { .. })
    ));
}

#[test]
fn test_authzid_reaches_server() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let provider = TestProvider::new(HashAlgorithm::Sha256);

    let (scram_client, client_first) = scram_client.client_first(Some("user"), "admin").unwrap();
    let scram_server = scram_server.handle_client_first(&client_first, &provider).unwrap();
    assert_eq!(scram_server.username(), "admin");
    assert_eq!(scram_server.authzid(), Some("user"));
    assert_eq!(scram_server.gs2_header(), scram_client.gs2_header());
    let (scram_server, server_first) = scram_server.server_first();
    assert_eq!(scram_server.salt(), b"messy");
    assert_eq!(scram_server.iterations().get(), 8192);

    let scram_client = scram_client.handle_server_first(&server_first, "admin_password").unwrap();
    let (scram_client, client_final) = scram_client.client_final();
    let salted_password = provider.salted_password("admin_password", "admin");
    let scram_server = scram_server.handle_client_final(&client_final, &salted_password).unwrap();
    assert_eq!(scram_server.authzid(), Some("user"));
    let server_final = scram_server.server_final(&salted_password);
    scram_client.handle_server_final(&server_final, "admin_password").unwrap();
}

#[test]
fn test_authzid_is_signed() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let provider = TestProvider::new(HashAlgorithm::Sha256);

    let (scram_client, client_first) = scram_client.client_first(Some("alice"), "user").unwrap();
    // A relay swaps the requested identity.
    let decoded = String::from_utf8(base64::decode(&client_first).unwrap()).unwrap();
    assert!(decoded.starts_with("n,a=alice,"));
    let rewritten = base64::encode(decoded.replacen("a=alice", "a=root", 1));

    let scram_server = scram_server.handle_client_first(&rewritten, &provider).unwrap();
    assert_eq!(scram_server.authzid(), Some("root"));
    let (scram_server, server_first) = scram_server.server_first();
    let scram_client = scram_client.handle_server_first(&server_first, "password").unwrap();
    let (_, client_final) = scram_client.client_final();
    assert!(client_final.starts_with(&format!("c={},", base64::encode("n,a=alice,"))));

    let salted_password = provider.salted_password("password", "user");
    assert!(matches!(
        scram_server.handle_client_final(&client_final, &salted_password),
        Err(Error::ChannelBindingMismatch)
    ));
}

#[test]
fn test_invalid_user() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());

    let (_, client_first) = scram_client.client_first(None, "nobody").unwrap();

    match scram_server.handle_client_first(&client_first, &TestProvider::new(HashAlgorithm::Sha256)) {
        Err(Error::Lookup(e)) => assert_eq!(e.to_string(), "no such user 'nobody'"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_closure_lookup() {
    let lookup = |username: &str| -> Result<SaltInfo, LookupError> {
        match username {
            "user" => Ok(SaltInfo::new(b"salt".to_vec(), 0)),
            _ => Err("unknown".into()),
        }
    };
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, client_first) = scram_client.client_first(None, "user").unwrap();

    // A stored iteration count of zero can't be used.
    assert!(matches!(
        scram_server.handle_client_first(&client_first, &lookup),
        Err(Error::Protocol(Kind::InvalidField(Field::Iterations)))
    ));
}

#[test]
fn test_missing_iterations() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (scram_client, _) = scram_client.client_first(None, "user").unwrap();
    let challenge = base64::encode("r=servernonce,s=c2FsdA==");
    assert!(matches!(
        scram_client.handle_server_first(&challenge, "password"),
        Err(Error::Protocol(Kind::ExpectedField(Field::Iterations)))
    ));
}

#[test]
fn test_challenge_not_base64() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (scram_client, _) = scram_client.client_first(None, "user").unwrap();
    assert!(matches!(
        scram_client.handle_server_first("r=abc,s=c2FsdA==,i=4096", "password"),
        Err(Error::Protocol(Kind::InvalidField(Field::Challenge)))
    ));
}

#[test]
fn test_tampered_server_signature() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let provider = TestProvider::new(HashAlgorithm::Sha256);

    let (scram_client, client_first) = scram_client.client_first(None, "user").unwrap();
    let scram_server = scram_server.handle_client_first(&client_first, &provider).unwrap();
    let (scram_server, server_first) = scram_server.server_first();
    let scram_client = scram_client.handle_server_first(&server_first, "password").unwrap();
    let (scram_client, client_final) = scram_client.client_final();

    // The server signs with a different salted password than the one it verified with.
    let salted_password = provider.salted_password("password", "user");
    let scram_server = scram_server.handle_client_final(&client_final, &salted_password).unwrap();
    let forged = scram_server.server_final(&provider.salted_password("other", "user"));
    assert!(matches!(
        scram_client.handle_server_final(&forged, "password"),
        Err(Error::VerificationFailed)
    ));
}

#[test]
fn test_server_final_errors() {
    fn client_after_final() -> client::ServerFinal {
        let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
        let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
        let provider = TestProvider::new(HashAlgorithm::Sha256);
        let (scram_client, client_first) = scram_client.client_first(None, "user").unwrap();
        let scram_server = scram_server.handle_client_first(&client_first, &provider).unwrap();
        let (_, server_first) = scram_server.server_first();
        let scram_client = scram_client.handle_server_first(&server_first, "password").unwrap();
        scram_client.client_final().0
    }

    match client_after_final().handle_server_final("e=invalid-proof", "password") {
        Err(Error::Authentication(message)) => assert_eq!(message, "invalid-proof"),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(matches!(
        client_after_final().handle_server_final("x=1", "password"),
        Err(Error::Protocol(Kind::ExpectedField(Field::VerifyOrError)))
    ));
    assert!(matches!(
        client_after_final().handle_server_final("v=!!!", "password"),
        Err(Error::Protocol(Kind::InvalidField(Field::VerifyOrError)))
    ));
    assert!(matches!(
        client_after_final().handle_server_final("v=AAAA", "password"),
        Err(Error::VerificationFailed)
    ));
}

#[test]
fn test_client_final_tampering() {
    fn server_and_final(password: &str) -> (server::ClientFinal, String) {
        let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
        let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
        let provider = TestProvider::new(HashAlgorithm::Sha256);
        let (scram_client, client_first) = scram_client.client_first(None, "user").unwrap();
        let scram_server = scram_server.handle_client_first(&client_first, &provider).unwrap();
        let (scram_server, server_first) = scram_server.server_first();
        let scram_client = scram_client.handle_server_first(&server_first, password).unwrap();
        (scram_server, scram_client.client_final().1)
    }
    let salted_password = TestProvider::new(HashAlgorithm::Sha256).salted_password("password", "user");

    // Replace the nonce.
    let (scram_server, client_final) = server_and_final("password");
    let (start, rest) = client_final.split_at(client_final.find(",r=").unwrap() + 3);
    let tampered = format!("{}~{}", start, &rest[1..]);
    assert!(matches!(
        scram_server.handle_client_final(&tampered, &salted_password),
        Err(Error::Protocol(Kind::InvalidNonce))
    ));

    // Drop the proof.
    let (scram_server, client_final) = server_and_final("password");
    let without_proof = &client_final[..client_final.find(",p=").unwrap()];
    assert!(matches!(
        scram_server.handle_client_final(without_proof, &salted_password),
        Err(Error::VerificationFailed)
    ));

    // A proof that isn't base64.
    let (scram_server, client_final) = server_and_final("password");
    let garbage = format!("{},p=***", &client_final[..client_final.find(",p=").unwrap()]);
    assert!(matches!(
        scram_server.handle_client_final(&garbage, &salted_password),
        Err(Error::VerificationFailed)
    ));

    // Missing channel binding attribute.
    let (scram_server, client_final) = server_and_final("password");
    let without_binding = &client_final["c=biws,".len()..];
    assert!(matches!(
        scram_server.handle_client_final(without_binding, &salted_password),
        Err(Error::Protocol(Kind::ExpectedField(Field::ChannelBinding)))
    ));
}

#[test]
fn test_server_first_tampering() {
    fn tampered_exchange(from: &str, to: &str) -> Result<server::ServerFinal, Error> {
        let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
        let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
        let provider = TestProvider::new(HashAlgorithm::Sha256);
        let (scram_client, client_first) = scram_client.client_first(None, "user").unwrap();
        let scram_server = scram_server.handle_client_first(&client_first, &provider).unwrap();
        let (scram_server, server_first) = scram_server.server_first();

        let decoded = String::from_utf8(base64::decode(&server_first).unwrap()).unwrap();
        assert!(decoded.contains(from));
        let relayed = base64::encode(decoded.replacen(from, to, 1));
        let scram_client = scram_client.handle_server_first(&relayed, "password").unwrap();
        let (_, client_final) = scram_client.client_final();

        let salted_password = provider.salted_password("password", "user");
        scram_server.handle_client_final(&client_final, &salted_password)
    }

    // Another iteration count.
    assert!(matches!(
        tampered_exchange(",i=4096", ",i=4097"),
        Err(Error::VerificationFailed)
    ));
    // Another salt.
    let salt = format!(",s={},", base64::encode("salt"));
    let other_salt = format!(",s={},", base64::encode("pepper"));
    assert!(matches!(
        tampered_exchange(&salt, &other_salt),
        Err(Error::VerificationFailed)
    ));
}

#[test]
fn test_excessive_iterations() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (scram_client, _) = scram_client.client_first(None, "user").unwrap();
    let challenge = base64::encode(format!("r=servernonce,s=c2FsdA==,i={}", MAX_ITERATIONS + 1));
    assert!(matches!(
        scram_client.handle_server_first(&challenge, "password"),
        Err(Error::Protocol(Kind::InvalidField(Field::Iterations)))
    ));

    let lookup = |_: &str| -> Result<SaltInfo, LookupError> {
        Ok(SaltInfo::new(b"salt".to_vec(), MAX_ITERATIONS + 1))
    };
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let scram_server = ScramServer::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, client_first) = scram_client.client_first(None, "user").unwrap();
    assert!(matches!(
        scram_server.handle_client_first(&client_first, &lookup),
        Err(Error::Protocol(Kind::InvalidField(Field::Iterations)))
    ));
}

#[test]
fn test_deterministic_rng() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, first) = scram_client
        .client_first_with_rng(None, "user", &mut StdRng::seed_from_u64(42))
        .unwrap();
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    let (_, second) = scram_client
        .client_first_with_rng(None, "user", &mut StdRng::seed_from_u64(42))
        .unwrap();
    assert_eq!(first, second);

    let decoded = String::from_utf8(base64::decode(&first).unwrap()).unwrap();
    assert!(decoded.starts_with("n,,n=user,r="));
    assert_eq!(decoded.len(), "n,,n=user,r=".len() + 24);
}

#[test]
fn test_username_with_comma() {
    let scram_client = ScramClient::new(HashAlgorithm::Sha256, ChannelBinding::None, Vec::new());
    assert!(matches!(
        scram_client.client_first(None, "us,er"),
        Err(Error::Protocol(Kind::InvalidField(Field::Authcid)))
    ));
}

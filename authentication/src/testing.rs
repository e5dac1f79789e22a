//! A software authenticator and fixture builders. They produce genuine
//! ceremonies (real keys, real signatures) so verification code can be
//! exercised end to end without a browser.

use ciborium::value::Value;
use p256::ecdsa::signature::Signer as _;
use rand::{thread_rng, RngCore};
use rsa::signature::{RandomizedSigner as _, SignatureEncoding as _};
use rsa::traits::PublicKeyParts as _;
use sha2::Sha256;

use crate::api::authenticator_responses::{
    AuthenticationResponseJSON, AuthenticatorAssertionResponseJSON,
    AuthenticatorAttestationResponseJSON, RegistrationResponseJSON, PUBLIC_KEY_CREDENTIAL_TYPE,
};
use crate::authenticator::attestation::{
    COSEAlgorithm, COSEEllipticCurve, COSEKey, EC2Key, OctetKeyPair, RSAKey,
};
use crate::authenticator::data::{AT, ED, UP, UV};
use crate::encoding::base64url;
use crate::security::challenge::Challenge;
use crate::security::sha2::generate_hash;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestKeyAlgorithm {
    ES256,
    EdDSA,
    RS256,
    PS256,
}

#[derive(Clone)]
pub enum CredentialKeyPair {
    ES256(p256::ecdsa::SigningKey),
    EdDSA(ed25519_dalek::SigningKey),
    RS256(rsa::RsaPrivateKey),
    PS256(rsa::RsaPrivateKey),
}

impl CredentialKeyPair {
    pub fn generate(algorithm: TestKeyAlgorithm) -> CredentialKeyPair {
        match algorithm {
            TestKeyAlgorithm::ES256 => {
                CredentialKeyPair::ES256(p256::ecdsa::SigningKey::random(&mut thread_rng()))
            }
            TestKeyAlgorithm::EdDSA => {
                CredentialKeyPair::EdDSA(ed25519_dalek::SigningKey::generate(&mut thread_rng()))
            }
            TestKeyAlgorithm::RS256 => CredentialKeyPair::RS256(rsa_private_key()),
            TestKeyAlgorithm::PS256 => CredentialKeyPair::PS256(rsa_private_key()),
        }
    }

    pub fn cose_key(&self) -> COSEKey {
        match self {
            CredentialKeyPair::ES256(signing_key) => {
                let point = signing_key.verifying_key().to_encoded_point(false);
                let mut x = [0; 32];
                let mut y = [0; 32];

                x.copy_from_slice(point.x().expect("uncompressed point"));
                y.copy_from_slice(point.y().expect("uncompressed point"));

                COSEKey::EC2(EC2Key {
                    alg: COSEAlgorithm::ES256,
                    crv: COSEEllipticCurve::P256,
                    x,
                    y,
                })
            }
            CredentialKeyPair::EdDSA(signing_key) => COSEKey::OctetKeyPair(OctetKeyPair {
                alg: COSEAlgorithm::EdDSA,
                crv: COSEEllipticCurve::Ed25519,
                x: signing_key.verifying_key().to_bytes(),
            }),
            CredentialKeyPair::RS256(private_key) => COSEKey::RSA(RSAKey {
                alg: COSEAlgorithm::RS256,
                n: private_key.n().to_bytes_be(),
                e: private_key.e().to_bytes_be(),
            }),
            CredentialKeyPair::PS256(private_key) => COSEKey::RSA(RSAKey {
                alg: COSEAlgorithm::PS256,
                n: private_key.n().to_bytes_be(),
                e: private_key.e().to_bytes_be(),
            }),
        }
    }

    /// Signs `message` the way an authenticator encodes each algorithm: DER
    /// for ECDSA, raw bytes for EdDSA and RSA.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            CredentialKeyPair::ES256(signing_key) => {
                let signature: p256::ecdsa::Signature = signing_key.sign(message);

                signature.to_der().as_bytes().to_vec()
            }
            CredentialKeyPair::EdDSA(signing_key) => signing_key.sign(message).to_bytes().to_vec(),
            CredentialKeyPair::RS256(private_key) => {
                rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.to_owned())
                    .sign_with_rng(&mut thread_rng(), message)
                    .to_vec()
            }
            CredentialKeyPair::PS256(private_key) => {
                rsa::pss::SigningKey::<Sha256>::new(private_key.to_owned())
                    .sign_with_rng(&mut thread_rng(), message)
                    .to_vec()
            }
        }
    }
}

fn rsa_private_key() -> rsa::RsaPrivateKey {
    rsa::RsaPrivateKey::new(&mut thread_rng(), 2048).expect("rsa key generation")
}

/// Builds raw authenticator data. The attested credential and extension
/// flags are set automatically when the matching section is added.
#[derive(Clone, Debug)]
pub struct AuthenticatorDataBuilder {
    rp_id: String,
    flags: u8,
    sign_count: u32,
    aaguid: [u8; 16],
    attested_credential: Option<(Vec<u8>, COSEKey)>,
    extensions: Option<Value>,
}

impl AuthenticatorDataBuilder {
    pub fn new(rp_id: &str) -> AuthenticatorDataBuilder {
        AuthenticatorDataBuilder {
            rp_id: rp_id.to_owned(),
            flags: 0,
            sign_count: 0,
            aaguid: [0; 16],
            attested_credential: None,
            extensions: None,
        }
    }

    pub fn flags(mut self, flags: u8) -> AuthenticatorDataBuilder {
        self.flags = flags;
        self
    }

    pub fn sign_count(mut self, sign_count: u32) -> AuthenticatorDataBuilder {
        self.sign_count = sign_count;
        self
    }

    pub fn aaguid(mut self, aaguid: [u8; 16]) -> AuthenticatorDataBuilder {
        self.aaguid = aaguid;
        self
    }

    pub fn attested_credential(
        mut self,
        credential_id: &[u8],
        credential_public_key: &COSEKey,
    ) -> AuthenticatorDataBuilder {
        self.attested_credential = Some((credential_id.to_vec(), credential_public_key.to_owned()));
        self
    }

    pub fn extensions(mut self, extensions: &Value) -> AuthenticatorDataBuilder {
        self.extensions = Some(extensions.to_owned());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut flags = self.flags;

        if self.attested_credential.is_some() {
            flags |= 1 << AT;
        }

        if self.extensions.is_some() {
            flags |= 1 << ED;
        }

        let mut authenticator_data = Vec::with_capacity(256);

        authenticator_data.extend_from_slice(&generate_hash(self.rp_id.as_bytes()));
        authenticator_data.push(flags);
        authenticator_data.extend_from_slice(&self.sign_count.to_be_bytes());

        if let Some((credential_id, credential_public_key)) = &self.attested_credential {
            let credential_id_length = u16::try_from(credential_id.len()).expect("credential id");

            authenticator_data.extend_from_slice(&self.aaguid);
            authenticator_data.extend_from_slice(&credential_id_length.to_be_bytes());
            authenticator_data.extend_from_slice(credential_id);
            authenticator_data
                .extend_from_slice(&credential_public_key.to_cbor().expect("cose key"));
        }

        if let Some(extensions) = &self.extensions {
            ciborium::ser::into_writer(extensions, &mut authenticator_data).expect("extensions");
        }

        authenticator_data
    }
}

pub fn attestation_object(format: &str, authenticator_data: &[u8], statement: &Value) -> Vec<u8> {
    let value = Value::Map(vec![
        (Value::Text(String::from("fmt")), Value::Text(format.to_owned())),
        (
            Value::Text(String::from("attStmt")),
            statement.to_owned(),
        ),
        (
            Value::Text(String::from("authData")),
            Value::Bytes(authenticator_data.to_vec()),
        ),
    ]);
    let mut attestation_object = Vec::with_capacity(authenticator_data.len() + 64);

    ciborium::ser::into_writer(&value, &mut attestation_object).expect("attestation object");

    attestation_object
}

pub fn client_data_json(r#type: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": r#type,
        "challenge": base64url::encode(challenge),
        "origin": origin,
        "crossOrigin": false,
    }))
    .expect("client data json")
}

/// Output of a `get` ceremony, before wire encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestAssertion {
    pub credential_id: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

/// A single credential, platform style authenticator with a "none"
/// attestation.
#[derive(Clone)]
pub struct SoftwareAuthenticator {
    pub rp_id: String,
    pub origin: String,
    pub key_pair: CredentialKeyPair,
    pub credential_id: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
    pub flags: u8,
}

impl SoftwareAuthenticator {
    pub fn new(rp_id: &str, origin: &str, algorithm: TestKeyAlgorithm) -> SoftwareAuthenticator {
        let mut credential_id = vec![0; 32];

        thread_rng().fill_bytes(&mut credential_id);

        SoftwareAuthenticator {
            rp_id: rp_id.to_owned(),
            origin: origin.to_owned(),
            key_pair: CredentialKeyPair::generate(algorithm),
            credential_id,
            user_handle: None,
            flags: 1 << UP | 1 << UV,
        }
    }

    pub fn with_user_handle(mut self, user_handle: &[u8]) -> SoftwareAuthenticator {
        self.user_handle = Some(user_handle.to_vec());
        self
    }

    /// Returns `(clientDataJSON, attestationObject)`.
    pub fn make_credential(&self, challenge: &Challenge) -> (Vec<u8>, Vec<u8>) {
        let client_data_json =
            client_data_json("webauthn.create", challenge.as_bytes(), &self.origin);
        let authenticator_data = AuthenticatorDataBuilder::new(&self.rp_id)
            .flags(self.flags)
            .attested_credential(&self.credential_id, &self.key_pair.cose_key())
            .build();
        let attestation_object =
            attestation_object("none", &authenticator_data, &Value::Map(Vec::new()));

        (client_data_json, attestation_object)
    }

    pub fn get_assertion(&self, challenge: &Challenge, sign_count: u32) -> TestAssertion {
        let client_data_json = client_data_json("webauthn.get", challenge.as_bytes(), &self.origin);
        let authenticator_data = AuthenticatorDataBuilder::new(&self.rp_id)
            .flags(self.flags)
            .sign_count(sign_count)
            .build();

        self.sign_assertion(client_data_json, authenticator_data)
    }

    pub fn sign_assertion(
        &self,
        client_data_json: Vec<u8>,
        authenticator_data: Vec<u8>,
    ) -> TestAssertion {
        let mut message = authenticator_data.to_owned();

        message.extend_from_slice(&generate_hash(&client_data_json));

        TestAssertion {
            credential_id: self.credential_id.to_owned(),
            signature: self.key_pair.sign(&message),
            client_data_json,
            authenticator_data,
            user_handle: self.user_handle.to_owned(),
        }
    }

    pub fn registration_response(&self, challenge: &Challenge) -> RegistrationResponseJSON {
        let (client_data_json, attestation_object) = self.make_credential(challenge);

        RegistrationResponseJSON {
            id: base64url::encode(&self.credential_id),
            raw_id: base64url::encode(&self.credential_id),
            response: AuthenticatorAttestationResponseJSON {
                client_data_json: base64url::encode(&client_data_json),
                attestation_object: base64url::encode(&attestation_object),
                transports: vec![String::from("internal")],
            },
            r#type: String::from(PUBLIC_KEY_CREDENTIAL_TYPE),
        }
    }

    pub fn authentication_response(
        &self,
        challenge: &Challenge,
        sign_count: u32,
    ) -> AuthenticationResponseJSON {
        let assertion = self.get_assertion(challenge, sign_count);

        AuthenticationResponseJSON {
            id: base64url::encode(&assertion.credential_id),
            raw_id: base64url::encode(&assertion.credential_id),
            response: AuthenticatorAssertionResponseJSON {
                client_data_json: base64url::encode(&assertion.client_data_json),
                authenticator_data: base64url::encode(&assertion.authenticator_data),
                signature: base64url::encode(&assertion.signature),
                user_handle: assertion
                    .user_handle
                    .as_deref()
                    .map(base64url::encode),
            },
            r#type: String::from(PUBLIC_KEY_CREDENTIAL_TYPE),
        }
    }
}

use ciborium::value::{Integer, Value};
use p256::ecdsa::signature::Verifier as _;
use rsa::{BigUint, RsaPublicKey};
use sha2::Sha256;

use crate::api::supporting_data_structures::COSEAlgorithmIdentifier;
use crate::encoding::cbor::{self, map_get_label, Limits};
use crate::error::{AuthenticationError, AuthenticationErrorType};

const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
const LABEL_D: i64 = -4;
const LABEL_N: i64 = -1;
const LABEL_E: i64 = -2;

const COORDINATE_LENGTH: usize = 32;
const MINIMUM_RSA_MODULUS_LENGTH: usize = 256;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum COSEKey {
    EC2(EC2Key),
    OctetKeyPair(OctetKeyPair),
    RSA(RSAKey),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EC2Key {
    pub alg: COSEAlgorithm,
    pub crv: COSEEllipticCurve,
    pub x: [u8; 32],
    pub y: [u8; 32],
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OctetKeyPair {
    pub alg: COSEAlgorithm,
    pub crv: COSEEllipticCurve,
    pub x: [u8; 32],
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RSAKey {
    pub alg: COSEAlgorithm,
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum COSEKeyType {
    Okp,
    Ec2,
    Rsa,
}

impl COSEKeyType {
    pub fn from_identifier(identifier: i128) -> Option<COSEKeyType> {
        match identifier {
            1 => Some(COSEKeyType::Okp),
            2 => Some(COSEKeyType::Ec2),
            3 => Some(COSEKeyType::Rsa),
            _ => None,
        }
    }

    pub fn identifier(&self) -> i64 {
        match self {
            COSEKeyType::Okp => 1,
            COSEKeyType::Ec2 => 2,
            COSEKeyType::Rsa => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum COSEAlgorithm {
    ES256,
    EdDSA,
    PS256,
    RS256,
}

impl COSEAlgorithm {
    pub fn from_identifier(identifier: i128) -> Option<COSEAlgorithm> {
        match identifier {
            -7 => Some(COSEAlgorithm::ES256),
            -8 => Some(COSEAlgorithm::EdDSA),
            -37 => Some(COSEAlgorithm::PS256),
            -257 => Some(COSEAlgorithm::RS256),
            _ => None,
        }
    }

    pub fn identifier(&self) -> COSEAlgorithmIdentifier {
        match self {
            COSEAlgorithm::ES256 => -7,
            COSEAlgorithm::EdDSA => -8,
            COSEAlgorithm::PS256 => -37,
            COSEAlgorithm::RS256 => -257,
        }
    }

    fn key_type(&self) -> COSEKeyType {
        match self {
            COSEAlgorithm::ES256 => COSEKeyType::Ec2,
            COSEAlgorithm::EdDSA => COSEKeyType::Okp,
            COSEAlgorithm::PS256 | COSEAlgorithm::RS256 => COSEKeyType::Rsa,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum COSEEllipticCurve {
    P256,
    Ed25519,
}

impl COSEEllipticCurve {
    pub fn from_identifier(identifier: i128) -> Option<COSEEllipticCurve> {
        match identifier {
            1 => Some(COSEEllipticCurve::P256),
            6 => Some(COSEEllipticCurve::Ed25519),
            _ => None,
        }
    }

    pub fn identifier(&self) -> i64 {
        match self {
            COSEEllipticCurve::P256 => 1,
            COSEEllipticCurve::Ed25519 => 6,
        }
    }
}

impl COSEKey {
    pub fn from_cbor(value: &Value) -> Result<COSEKey, AuthenticationError> {
        let map = match value {
            Value::Map(map) => map,
            _ => return Err(malformed("credential public key is not a map")),
        };

        if map
            .iter()
            .any(|(label, _)| !matches!(label, Value::Integer(_)))
        {
            return Err(malformed("credential public key has a non integer label"));
        }

        let kty = integer_parameter(map, LABEL_KTY)
            .and_then(COSEKeyType::from_identifier)
            .ok_or_else(|| malformed("unsupported or missing key type"))?;
        let alg = integer_parameter(map, LABEL_ALG)
            .and_then(COSEAlgorithm::from_identifier)
            .ok_or_else(|| malformed("unsupported or missing algorithm"))?;

        if alg.key_type() != kty {
            return Err(malformed("algorithm does not match key type"));
        }

        match kty {
            COSEKeyType::Ec2 => {
                if map_get_label(map, LABEL_D).is_some() {
                    return Err(malformed("public key carries private parameters"));
                }

                let crv = curve_parameter(map)?;

                if crv != COSEEllipticCurve::P256 {
                    return Err(malformed("EC2 key is not on P-256"));
                }

                let x = coordinate_parameter(map, LABEL_X)?;
                let y = coordinate_parameter(map, LABEL_Y)?;
                let key = EC2Key { alg, crv, x, y };

                key.verifying_key()?;

                Ok(COSEKey::EC2(key))
            }
            COSEKeyType::Okp => {
                if map_get_label(map, LABEL_D).is_some() {
                    return Err(malformed("public key carries private parameters"));
                }

                let crv = curve_parameter(map)?;

                if crv != COSEEllipticCurve::Ed25519 {
                    return Err(malformed("OKP key is not on Ed25519"));
                }

                let x = coordinate_parameter(map, LABEL_X)?;
                let key = OctetKeyPair { alg, crv, x };

                key.verifying_key()?;

                Ok(COSEKey::OctetKeyPair(key))
            }
            COSEKeyType::Rsa => {
                let n = bytes_parameter(map, LABEL_N)
                    .ok_or_else(|| malformed("RSA key is missing its modulus"))?;
                let e = bytes_parameter(map, LABEL_E)
                    .ok_or_else(|| malformed("RSA key is missing its exponent"))?;

                if n.len() < MINIMUM_RSA_MODULUS_LENGTH || n[0] == 0 {
                    return Err(malformed("RSA modulus is shorter than 2048 bits"));
                }

                if e.is_empty() || e.len() > 8 {
                    return Err(malformed("RSA exponent out of range"));
                }

                let key = RSAKey {
                    alg,
                    n: n.to_vec(),
                    e: e.to_vec(),
                };

                key.public_key()?;

                Ok(COSEKey::RSA(key))
            }
        }
    }

    pub fn from_cbor_bytes(bytes: &[u8]) -> Result<COSEKey, AuthenticationError> {
        match cbor::from_slice(bytes, Limits::default()) {
            Ok(value) => COSEKey::from_cbor(&value),
            Err(error) => {
                log::debug!("credential public key decoding error -> {}", error);

                Err(AuthenticationError {
                    error: AuthenticationErrorType::InvalidAttestationObject,
                })
            }
        }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, AuthenticationError> {
        let label = |label: i64| Value::Integer(Integer::from(label));
        let mut map = Vec::with_capacity(5);

        match self {
            COSEKey::EC2(parameters) => {
                map.push((label(LABEL_KTY), label(COSEKeyType::Ec2.identifier())));
                map.push((label(LABEL_ALG), label(parameters.alg.identifier())));
                map.push((label(LABEL_CRV), label(parameters.crv.identifier())));
                map.push((label(LABEL_X), Value::Bytes(parameters.x.to_vec())));
                map.push((label(LABEL_Y), Value::Bytes(parameters.y.to_vec())));
            }
            COSEKey::OctetKeyPair(parameters) => {
                map.push((label(LABEL_KTY), label(COSEKeyType::Okp.identifier())));
                map.push((label(LABEL_ALG), label(parameters.alg.identifier())));
                map.push((label(LABEL_CRV), label(parameters.crv.identifier())));
                map.push((label(LABEL_X), Value::Bytes(parameters.x.to_vec())));
            }
            COSEKey::RSA(parameters) => {
                map.push((label(LABEL_KTY), label(COSEKeyType::Rsa.identifier())));
                map.push((label(LABEL_ALG), label(parameters.alg.identifier())));
                map.push((label(LABEL_N), Value::Bytes(parameters.n.to_owned())));
                map.push((label(LABEL_E), Value::Bytes(parameters.e.to_owned())));
            }
        }

        let mut cbor = Vec::with_capacity(300);

        match ciborium::ser::into_writer(&Value::Map(map), &mut cbor) {
            Ok(()) => {
                cbor.shrink_to_fit();

                Ok(cbor)
            }
            Err(error) => {
                log::warn!("credential public key encoding error -> {:?}", error);

                Err(AuthenticationError {
                    error: AuthenticationErrorType::InvalidAttestationObject,
                })
            }
        }
    }

    pub fn algorithm(&self) -> COSEAlgorithm {
        match self {
            COSEKey::EC2(parameters) => parameters.alg,
            COSEKey::OctetKeyPair(parameters) => parameters.alg,
            COSEKey::RSA(parameters) => parameters.alg,
        }
    }

    /// Verifies `signature` over `authenticator_data || client_data_hash`, the
    /// payload signed by authenticators for both assertions and self attestation.
    pub fn verify(
        &self,
        signature: &[u8],
        authenticator_data: &[u8],
        client_data_hash: &[u8],
    ) -> Result<(), AuthenticationError> {
        let mut message = Vec::with_capacity(authenticator_data.len() + client_data_hash.len());

        message.extend_from_slice(authenticator_data);
        message.extend_from_slice(client_data_hash);

        let verified = match self {
            COSEKey::EC2(parameters) => parameters.verify(signature, &message),
            COSEKey::OctetKeyPair(parameters) => parameters.verify(signature, &message),
            COSEKey::RSA(parameters) => parameters.verify(signature, &message),
        };

        match verified {
            true => Ok(()),
            false => Err(AuthenticationError {
                error: AuthenticationErrorType::SignatureVerificationFailed,
            }),
        }
    }
}

impl EC2Key {
    /// Fails unless `(x, y)` is a point on P-256.
    pub fn verifying_key(&self) -> Result<p256::ecdsa::VerifyingKey, AuthenticationError> {
        let mut sec1 = Vec::with_capacity(1 + 2 * COORDINATE_LENGTH);

        sec1.push(0x04);
        sec1.extend_from_slice(&self.x);
        sec1.extend_from_slice(&self.y);

        match p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1) {
            Ok(verifying_key) => Ok(verifying_key),
            Err(error) => {
                log::debug!("ES256 public key rejected -> {:?}", error);

                Err(malformed("EC2 point is not on P-256"))
            }
        }
    }

    fn verify(&self, signature: &[u8], message: &[u8]) -> bool {
        let verifying_key = match self.verifying_key() {
            Ok(verifying_key) => verifying_key,
            Err(_) => return false,
        };

        match p256::ecdsa::Signature::from_der(signature) {
            Ok(signature) => verifying_key.verify(message, &signature).is_ok(),
            Err(error) => {
                log::debug!("ES256 signature encoding rejected -> {:?}", error);

                false
            }
        }
    }
}

impl OctetKeyPair {
    pub fn verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, AuthenticationError> {
        match ed25519_dalek::VerifyingKey::from_bytes(&self.x) {
            Ok(verifying_key) => Ok(verifying_key),
            Err(error) => {
                log::debug!("EdDSA public key rejected -> {:?}", error);

                Err(malformed("OKP point does not decompress"))
            }
        }
    }

    fn verify(&self, signature: &[u8], message: &[u8]) -> bool {
        let verifying_key = match self.verifying_key() {
            Ok(verifying_key) => verifying_key,
            Err(_) => return false,
        };

        match ed25519_dalek::Signature::from_slice(signature) {
            Ok(signature) => verifying_key.verify_strict(message, &signature).is_ok(),
            Err(error) => {
                log::debug!("EdDSA signature encoding rejected -> {:?}", error);

                false
            }
        }
    }
}

impl RSAKey {
    /// Fails for moduli above 4096 bits and exponents the `rsa` crate refuses.
    pub fn public_key(&self) -> Result<RsaPublicKey, AuthenticationError> {
        match RsaPublicKey::new(
            BigUint::from_bytes_be(&self.n),
            BigUint::from_bytes_be(&self.e),
        ) {
            Ok(public_key) => Ok(public_key),
            Err(error) => {
                log::debug!("RSA public key rejected -> {:?}", error);

                Err(malformed("RSA parameters out of range"))
            }
        }
    }

    fn verify(&self, signature: &[u8], message: &[u8]) -> bool {
        let public_key = match self.public_key() {
            Ok(public_key) => public_key,
            Err(_) => return false,
        };

        match self.alg {
            COSEAlgorithm::RS256 => {
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);

                match rsa::pkcs1v15::Signature::try_from(signature) {
                    Ok(signature) => verifying_key.verify(message, &signature).is_ok(),
                    Err(_) => false,
                }
            }
            COSEAlgorithm::PS256 => {
                let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new(public_key);

                match rsa::pss::Signature::try_from(signature) {
                    Ok(signature) => verifying_key.verify(message, &signature).is_ok(),
                    Err(_) => false,
                }
            }
            COSEAlgorithm::ES256 | COSEAlgorithm::EdDSA => false,
        }
    }
}

fn malformed(reason: &str) -> AuthenticationError {
    log::debug!("malformed credential public key -> {}", reason);

    AuthenticationError {
        error: AuthenticationErrorType::InvalidAttestationObject,
    }
}

fn integer_parameter(map: &[(Value, Value)], label: i64) -> Option<i128> {
    match map_get_label(map, label) {
        Some(Value::Integer(integer)) => Some(i128::from(*integer)),
        _ => None,
    }
}

fn bytes_parameter(map: &[(Value, Value)], label: i64) -> Option<&[u8]> {
    match map_get_label(map, label) {
        Some(Value::Bytes(bytes)) => Some(bytes),
        _ => None,
    }
}

fn curve_parameter(map: &[(Value, Value)]) -> Result<COSEEllipticCurve, AuthenticationError> {
    integer_parameter(map, LABEL_CRV)
        .and_then(COSEEllipticCurve::from_identifier)
        .ok_or_else(|| malformed("unsupported or missing curve"))
}

fn coordinate_parameter(
    map: &[(Value, Value)],
    label: i64,
) -> Result<[u8; 32], AuthenticationError> {
    let bytes = bytes_parameter(map, label).ok_or_else(|| malformed("missing coordinate"))?;
    let mut coordinate = [0; COORDINATE_LENGTH];

    match bytes.len() == COORDINATE_LENGTH {
        true => {
            coordinate.copy_from_slice(bytes);

            Ok(coordinate)
        }
        false => Err(malformed("coordinate has the wrong length")),
    }
}

use ciborium::value::Value;

use crate::api::supporting_data_structures::COSEAlgorithmIdentifier;
use crate::authenticator::attestation::statement_format::AttestationStatementVerifier;
use crate::authenticator::attestation::AttestationObject;
use crate::encoding::cbor::map_get;
use crate::error::{AuthenticationError, AuthenticationErrorType};
use crate::security::sha2::generate_hash;

#[derive(Clone, Debug, PartialEq)]
pub struct PackedAttestationStatementSyntax {
    pub alg: COSEAlgorithmIdentifier,
    pub sig: Vec<u8>,
    pub x5c: Option<Vec<Vec<u8>>>,
}

impl PackedAttestationStatementSyntax {
    pub fn from_statement(
        statement: Option<&Value>,
    ) -> Result<PackedAttestationStatementSyntax, AuthenticationError> {
        let map = match statement {
            Some(Value::Map(map)) => map,
            _ => return Err(failed("packed statement is missing")),
        };

        let alg = match map_get(map, "alg") {
            Some(Value::Integer(alg)) => match i64::try_from(*alg) {
                Ok(alg) => alg,
                Err(_) => return Err(failed("packed alg out of range")),
            },
            _ => return Err(failed("packed statement is missing alg")),
        };

        let sig = match map_get(map, "sig") {
            Some(Value::Bytes(sig)) => sig.to_owned(),
            _ => return Err(failed("packed statement is missing sig")),
        };

        let x5c = match map_get(map, "x5c") {
            Some(Value::Array(certificates)) => {
                let mut x5c = Vec::with_capacity(certificates.len());

                for certificate in certificates {
                    match certificate {
                        Value::Bytes(certificate) => x5c.push(certificate.to_owned()),
                        _ => return Err(failed("packed x5c entry is not a byte string")),
                    }
                }

                Some(x5c)
            }
            Some(_) => return Err(failed("packed x5c is not an array")),
            None => None,
        };

        Ok(PackedAttestationStatementSyntax { alg, sig, x5c })
    }
}

/// Accepts `packed` self attestation only: the statement is signed by the
/// credential key itself. Certificate based (`x5c`) statements need a trust
/// anchor policy this verifier does not have, so they are rejected.
///
/// Not registered by default.
#[derive(Clone, Copy, Debug, Default)]
pub struct PackedSelfAttestationVerifier;

impl AttestationStatementVerifier for PackedSelfAttestationVerifier {
    fn verify(
        &self,
        attestation: &AttestationObject,
        client_data_json: &[u8],
    ) -> Result<(), AuthenticationError> {
        let statement =
            PackedAttestationStatementSyntax::from_statement(attestation.attestation_statement.as_ref())?;

        if statement.x5c.is_some() {
            return Err(failed("packed full attestation is not trusted"));
        }

        let credential_public_key = &attestation.attested_credential_data()?.credential_public_key;

        if statement.alg != credential_public_key.algorithm().identifier() {
            return Err(failed("packed alg does not match the credential key"));
        }

        let client_data_hash = generate_hash(client_data_json);

        match credential_public_key.verify(
            &statement.sig,
            &attestation.raw_authenticator_data,
            &client_data_hash,
        ) {
            Ok(()) => Ok(()),
            Err(_) => Err(failed("packed self attestation signature is invalid")),
        }
    }
}

fn failed(reason: &str) -> AuthenticationError {
    log::warn!("packed attestation verification failed -> {}", reason);

    AuthenticationError {
        error: AuthenticationErrorType::AttestationVerificationFailed,
    }
}

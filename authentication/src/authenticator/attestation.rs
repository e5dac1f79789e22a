use ciborium::value::Value;

pub use crate::authenticator::attestation::cose_key_format::{
    COSEAlgorithm, COSEEllipticCurve, COSEKey, COSEKeyType, EC2Key, OctetKeyPair, RSAKey,
};
pub use crate::authenticator::attestation::statement_format::{
    AttestationStatementFormat, AttestationStatementFormatIdentifier,
    AttestationStatementVerifier, AttestationVerifierRegistry, NoneAttestationStatementVerifier,
    PackedSelfAttestationVerifier,
};
use crate::authenticator::data::AuthenticatorData;
use crate::encoding::cbor::{self, map_get, Decoder, Limits};
use crate::error::{AuthenticationError, AuthenticationErrorType};

mod cose_key_format;
mod statement_format;

pub const AAGUID_LENGTH: usize = 16;
pub const MAXIMUM_CREDENTIAL_ID_LENGTH: usize = 1023;

/// The decoded `attestationObject` of a registration ceremony. The raw
/// authenticator data is kept alongside the parsed form because attestation
/// signatures cover the exact bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub format: AttestationStatementFormatIdentifier,
    pub raw_authenticator_data: Vec<u8>,
    pub authenticator_data: AuthenticatorData,
    pub attestation_statement: Option<Value>,
}

impl AttestationObject {
    pub fn from_byte_array(data: &[u8]) -> Result<AttestationObject, AuthenticationError> {
        let value = match cbor::from_slice(data, Limits::default()) {
            Ok(value) => value,
            Err(error) => return Err(malformed(&error.to_string())),
        };

        let map = match &value {
            Value::Map(map) => map,
            _ => return Err(malformed("attestation object is not a map")),
        };

        let format = match map_get(map, "fmt") {
            Some(Value::Text(format)) if !format.is_empty() => format.to_owned(),
            _ => return Err(malformed("missing or invalid fmt")),
        };

        let raw_authenticator_data = match map_get(map, "authData") {
            Some(Value::Bytes(authenticator_data)) => authenticator_data.to_owned(),
            _ => return Err(malformed("missing or invalid authData")),
        };

        let attestation_statement = match map_get(map, "attStmt") {
            Some(statement @ Value::Map(_)) => Some(statement.to_owned()),
            Some(_) => return Err(malformed("attStmt is not a map")),
            None => None,
        };

        let authenticator_data = AuthenticatorData::from_byte_array(&raw_authenticator_data)?;

        Ok(AttestationObject {
            format,
            raw_authenticator_data,
            authenticator_data,
            attestation_statement,
        })
    }

    /// The credential a registration must carry; its absence is malformed.
    pub fn attested_credential_data(&self) -> Result<&AttestedCredentialData, AuthenticationError> {
        match &self.authenticator_data.attested_credential_data {
            Some(attested_credential_data) => Ok(attested_credential_data),
            None => Err(malformed("registration without attested credential data")),
        }
    }

    pub fn statement_is_empty(&self) -> bool {
        match &self.attestation_statement {
            None => true,
            Some(Value::Map(statement)) => statement.is_empty(),
            Some(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub credential_public_key: COSEKey,
}

impl AttestedCredentialData {
    /// Returns the parsed data and the number of bytes it occupied, since the
    /// COSE key is self delimiting and extensions may follow it.
    pub fn from_byte_array(
        data: &[u8],
    ) -> Result<(AttestedCredentialData, usize), AuthenticationError> {
        if data.len() < AAGUID_LENGTH + 2 {
            return Err(malformed("attested credential data is truncated"));
        }

        let mut aaguid: [u8; 16] = [0; AAGUID_LENGTH];
        let mut credential_id_length: [u8; 2] = [0; 2];

        let (aaguid_data, remaining) = data.split_at(AAGUID_LENGTH);
        let (credential_id_length_bytes, remaining) = remaining.split_at(2);

        aaguid.copy_from_slice(aaguid_data);
        credential_id_length.copy_from_slice(credential_id_length_bytes);

        let credential_id_index = u16::from_be_bytes(credential_id_length) as usize;

        if credential_id_index == 0 || credential_id_index > MAXIMUM_CREDENTIAL_ID_LENGTH {
            return Err(malformed("credential id length out of range"));
        }

        if remaining.len() < credential_id_index {
            return Err(malformed("credential id is truncated"));
        }

        let (credential_id, credential_public_key_cbor) = remaining.split_at(credential_id_index);

        let mut decoder = match Decoder::new(credential_public_key_cbor, Limits::default()) {
            Ok(decoder) => decoder,
            Err(error) => return Err(malformed(&error.to_string())),
        };
        let credential_public_key = match decoder.decode_value() {
            Ok(value) => COSEKey::from_cbor(&value)?,
            Err(error) => return Err(malformed(&error.to_string())),
        };

        let consumed = AAGUID_LENGTH + 2 + credential_id_index + decoder.position();

        Ok((
            AttestedCredentialData {
                aaguid,
                credential_id: credential_id.to_vec(),
                credential_public_key,
            },
            consumed,
        ))
    }
}

fn malformed(reason: &str) -> AuthenticationError {
    log::debug!("malformed attestation object -> {}", reason);

    AuthenticationError {
        error: AuthenticationErrorType::InvalidAttestationObject,
    }
}

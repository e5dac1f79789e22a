use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::encoding::base64url;
use crate::error::{AuthenticationError, AuthenticationErrorType, ClientDataField};

pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthenticatorAttestationResponseJSON {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "attestationObject")]
    pub attestation_object: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthenticatorAssertionResponseJSON {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: String,
    pub signature: String,
    #[serde(rename = "userHandle", default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

/// What the browser posts back after `navigator.credentials.create()`, with
/// every binary member base64url encoded.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegistrationResponseJSON {
    pub id: String,
    #[serde(rename = "rawId")]
    pub raw_id: String,
    pub response: AuthenticatorAttestationResponseJSON,
    #[serde(default = "public_key")]
    pub r#type: String,
}

impl RegistrationResponseJSON {
    pub fn client_data_json(&self) -> Result<Vec<u8>, AuthenticationError> {
        decode_client_data_json(&self.response.client_data_json)
    }

    pub fn attestation_object(&self) -> Result<Vec<u8>, AuthenticationError> {
        decode(
            &self.response.attestation_object,
            AuthenticationErrorType::InvalidAttestationObject,
        )
    }

    pub fn transports(&self) -> BTreeSet<String> {
        self.response.transports.iter().cloned().collect()
    }
}

/// What the browser posts back after `navigator.credentials.get()`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthenticationResponseJSON {
    pub id: String,
    #[serde(rename = "rawId")]
    pub raw_id: String,
    pub response: AuthenticatorAssertionResponseJSON,
    #[serde(default = "public_key")]
    pub r#type: String,
}

impl AuthenticationResponseJSON {
    pub fn credential_id(&self) -> Result<Vec<u8>, AuthenticationError> {
        decode(&self.raw_id, AuthenticationErrorType::UnknownCredential)
    }

    pub fn client_data_json(&self) -> Result<Vec<u8>, AuthenticationError> {
        decode_client_data_json(&self.response.client_data_json)
    }

    pub fn authenticator_data(&self) -> Result<Vec<u8>, AuthenticationError> {
        decode(
            &self.response.authenticator_data,
            AuthenticationErrorType::InvalidAttestationObject,
        )
    }

    pub fn signature(&self) -> Result<Vec<u8>, AuthenticationError> {
        decode(
            &self.response.signature,
            AuthenticationErrorType::SignatureVerificationFailed,
        )
    }

    pub fn user_handle(&self) -> Result<Option<Vec<u8>>, AuthenticationError> {
        match &self.response.user_handle {
            Some(user_handle) if !user_handle.is_empty() => Ok(Some(decode(
                user_handle,
                AuthenticationErrorType::UnknownCredential,
            )?)),
            _ => Ok(None),
        }
    }
}

fn public_key() -> String {
    String::from(PUBLIC_KEY_CREDENTIAL_TYPE)
}

fn decode_client_data_json(value: &str) -> Result<Vec<u8>, AuthenticationError> {
    decode(
        value,
        AuthenticationErrorType::InvalidClientData(ClientDataField::Encoding),
    )
}

fn decode(value: &str, error: AuthenticationErrorType) -> Result<Vec<u8>, AuthenticationError> {
    match base64url::decode(value) {
        Ok(bytes) => Ok(bytes),
        Err(decode_error) => {
            log::debug!("base64url decoding failed -> {}", decode_error);

            Err(AuthenticationError { error })
        }
    }
}

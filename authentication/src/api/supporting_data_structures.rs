use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthenticationError, AuthenticationErrorType, ClientDataField};

pub type COSEAlgorithmIdentifier = i64;

/// The JSON compatible serialization of client data the browser passes to the
/// authenticator. Members this crate does not interpret are ignored.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CollectedClientData {
    pub r#type: String,
    pub challenge: String,
    pub origin: String,
    #[serde(rename = "crossOrigin", default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    #[serde(rename = "topOrigin", default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,
}

impl CollectedClientData {
    pub fn from_json(client_data_json: &[u8]) -> Result<CollectedClientData, AuthenticationError> {
        match serde_json::from_slice(client_data_json) {
            Ok(collected_client_data) => Ok(collected_client_data),
            Err(error) => {
                log::debug!("client data is not valid json -> {}", error);

                Err(AuthenticationError {
                    error: AuthenticationErrorType::InvalidClientData(ClientDataField::Json),
                })
            }
        }
    }

    pub fn is_cross_origin(&self) -> bool {
        self.cross_origin.unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientDataType {
    Create,
    Get,
}

impl ClientDataType {
    pub fn literal(&self) -> &'static str {
        match self {
            ClientDataType::Create => "webauthn.create",
            ClientDataType::Get => "webauthn.get",
        }
    }
}

impl fmt::Display for ClientDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

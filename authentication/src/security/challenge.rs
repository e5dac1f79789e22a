use rand::{thread_rng, RngCore};

use crate::encoding::base64url;
use crate::error::{AuthenticationError, AuthenticationErrorType, ClientDataField};
use crate::security::sha2::constant_time_eq;

pub const MINIMUM_CHALLENGE_LENGTH: usize = 16;
pub const DEFAULT_CHALLENGE_LENGTH: usize = 32;

/// A server issued, single use nonce. Issuing and tracking belong to the
/// challenge store; verification only ever compares bytes.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Challenge(Vec<u8>);

impl Challenge {
    pub fn generate() -> Challenge {
        let mut challenge = vec![0; DEFAULT_CHALLENGE_LENGTH];

        thread_rng().fill_bytes(&mut challenge);

        Challenge(challenge)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Challenge, AuthenticationError> {
        match bytes.len() >= MINIMUM_CHALLENGE_LENGTH {
            true => Ok(Challenge(bytes.to_vec())),
            false => Err(AuthenticationError {
                error: AuthenticationErrorType::InvalidClientData(ClientDataField::Challenge),
            }),
        }
    }

    pub fn from_base64url(challenge: &str) -> Result<Challenge, AuthenticationError> {
        match base64url::decode(challenge) {
            Ok(bytes) => Challenge::from_bytes(&bytes),
            Err(error) => {
                log::debug!("challenge base64url decoding error -> {:?}", error);

                Err(AuthenticationError {
                    error: AuthenticationErrorType::InvalidClientData(ClientDataField::Challenge),
                })
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        base64url::encode(&self.0)
    }

    pub fn matches(&self, presented: &[u8]) -> bool {
        constant_time_eq(&self.0, presented)
    }
}

impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Challenge").field(&"..").finish()
    }
}

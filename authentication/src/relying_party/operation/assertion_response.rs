use crate::api::supporting_data_structures::ClientDataType;
use crate::authenticator::data::{AuthenticatorData, SignCount};
use crate::error::{AuthenticationError, AuthenticationErrorType};
use crate::relying_party::config::RelyingPartyConfig;
use crate::relying_party::credential::PublicKeyCredential;
use crate::relying_party::operation::client_data::ClientDataValidator;
use crate::security::challenge::Challenge;
use crate::security::sha2::{constant_time_eq, generate_hash};

pub struct AssertionResponse<'a> {
    client_data_json: &'a [u8],
    authenticator_data: &'a [u8],
    signature: &'a [u8],
    credential_id: Option<&'a [u8]>,
    user_handle: Option<&'a [u8]>,
}

impl<'a> AssertionResponse<'a> {
    pub fn new(
        client_data_json: &'a [u8],
        authenticator_data: &'a [u8],
        signature: &'a [u8],
    ) -> AssertionResponse<'a> {
        AssertionResponse {
            client_data_json,
            authenticator_data,
            signature,
            credential_id: None,
            user_handle: None,
        }
    }

    /// The credential id the client reported (`rawId`).
    pub fn credential_id(mut self, credential_id: &'a [u8]) -> AssertionResponse<'a> {
        self.credential_id = Some(credential_id);
        self
    }

    pub fn user_handle(mut self, user_handle: Option<&'a [u8]>) -> AssertionResponse<'a> {
        self.user_handle = user_handle;
        self
    }

    /// Returns the sign count to store. The credential itself is not touched.
    pub fn validate(
        &self,
        config: &RelyingPartyConfig,
        credential: &PublicKeyCredential,
        challenge: &Challenge,
    ) -> Result<SignCount, AuthenticationError> {
        self.verify_credential_id(credential)?;

        ClientDataValidator::from_config(config).parse_and_validate(
            self.client_data_json,
            ClientDataType::Get,
            challenge,
        )?;

        let authenticator_data = AuthenticatorData::from_byte_array(self.authenticator_data)?;

        if authenticator_data.includes_attested_credential_data() {
            log::warn!("assertion rejected | authenticator data carries a credential");

            return Err(AuthenticationError {
                error: AuthenticationErrorType::InvalidAttestationObject,
            });
        }

        authenticator_data.verify_rp_id_hash(&config.rp_id)?;
        authenticator_data.verify_user_present()?;
        authenticator_data.verify_user_verification(config.user_verification)?;

        self.verify_user_handle(credential)?;
        self.verify_signature(credential)?;

        verify_sign_count(credential.sign_count(), authenticator_data.sign_count)
    }

    pub fn verify_credential_id(
        &self,
        credential: &PublicKeyCredential,
    ) -> Result<(), AuthenticationError> {
        match self.credential_id {
            Some(credential_id) if !constant_time_eq(credential_id, credential.id()) => {
                log::warn!("assertion rejected | credential id does not match");

                Err(AuthenticationError {
                    error: AuthenticationErrorType::UnknownCredential,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn verify_user_handle(
        &self,
        credential: &PublicKeyCredential,
    ) -> Result<(), AuthenticationError> {
        match self.user_handle {
            Some(user_handle) if !constant_time_eq(user_handle, credential.user_handle()) => {
                log::warn!(
                    "assertion rejected | user handle does not belong to {}",
                    credential.owner(),
                );

                Err(AuthenticationError {
                    error: AuthenticationErrorType::UnknownCredential,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn verify_signature(
        &self,
        credential: &PublicKeyCredential,
    ) -> Result<(), AuthenticationError> {
        let client_data_hash = generate_hash(self.client_data_json);

        match credential.public_key().verify(
            self.signature,
            self.authenticator_data,
            &client_data_hash,
        ) {
            Ok(()) => Ok(()),
            Err(error) => {
                log::warn!(
                    "assertion rejected | signature verification failed for {}",
                    credential.owner(),
                );

                Err(error)
            }
        }
    }
}

/// Counter rule: once a credential has reported a non zero count, every
/// assertion has to report a strictly greater one. Credentials that never
/// count stay at zero and are never compared.
pub fn verify_sign_count(
    stored: SignCount,
    presented: SignCount,
) -> Result<SignCount, AuthenticationError> {
    match stored > 0 && presented <= stored {
        true => {
            log::error!(
                "possible cloned authenticator | stored sign count {} presented {}",
                stored,
                presented,
            );

            Err(AuthenticationError {
                error: AuthenticationErrorType::PossibleCloneDetected,
            })
        }
        false => Ok(presented),
    }
}

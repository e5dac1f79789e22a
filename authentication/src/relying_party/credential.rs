use std::collections::BTreeSet;
use uuid::Uuid;

use crate::authenticator::attestation::{AttestationVerifierRegistry, COSEKey};
use crate::authenticator::data::SignCount;
use crate::error::AuthenticationError;
use crate::relying_party::config::RelyingPartyConfig;
use crate::relying_party::operation::assertion_response::AssertionResponse;
use crate::relying_party::operation::attestation_response::AttestationResponse;
use crate::security::challenge::Challenge;

/// A registered credential. The id, key and attestation format never change
/// after registration; only the sign count moves, and only forward.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKeyCredential {
    id: Vec<u8>,
    public_key: COSEKey,
    sign_count: SignCount,
    transports: BTreeSet<String>,
    owner: Uuid,
    attestation_format: String,
}

impl PublicKeyCredential {
    /// Runs a registration ceremony and returns the new, unsaved credential.
    pub fn create(
        config: &RelyingPartyConfig,
        registry: &AttestationVerifierRegistry,
        client_data_json: &[u8],
        attestation_object: &[u8],
        challenge: &Challenge,
        transports: BTreeSet<String>,
        owner: Uuid,
    ) -> Result<PublicKeyCredential, AuthenticationError> {
        let attestation = AttestationResponse::new(client_data_json, attestation_object)
            .validate(config, registry, challenge)?;

        log::info!(
            "credential registered for {} | format {} | algorithm {:?}",
            owner,
            attestation.attestation_format,
            attestation.public_key.algorithm(),
        );

        Ok(PublicKeyCredential {
            id: attestation.credential_id,
            public_key: attestation.public_key,
            sign_count: attestation.sign_count,
            transports,
            owner,
            attestation_format: attestation.attestation_format,
        })
    }

    /// Rebuilds a credential from persisted fields.
    pub fn restore(
        id: Vec<u8>,
        public_key: COSEKey,
        sign_count: SignCount,
        transports: BTreeSet<String>,
        owner: Uuid,
        attestation_format: String,
    ) -> PublicKeyCredential {
        PublicKeyCredential {
            id,
            public_key,
            sign_count,
            transports,
            owner,
            attestation_format,
        }
    }

    /// Runs an authentication ceremony against this credential and moves the
    /// in memory sign count forward on success. Persisting it is up to the
    /// caller.
    pub fn authenticate(
        &mut self,
        config: &RelyingPartyConfig,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        signature: &[u8],
        challenge: &Challenge,
    ) -> Result<(), AuthenticationError> {
        self.authenticate_response(
            config,
            &AssertionResponse::new(client_data_json, authenticator_data, signature),
            challenge,
        )
    }

    pub fn authenticate_response(
        &mut self,
        config: &RelyingPartyConfig,
        response: &AssertionResponse,
        challenge: &Challenge,
    ) -> Result<(), AuthenticationError> {
        self.sign_count = response.validate(config, self, challenge)?;

        Ok(())
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn public_key(&self) -> &COSEKey {
        &self.public_key
    }

    pub fn sign_count(&self) -> SignCount {
        self.sign_count
    }

    pub fn transports(&self) -> &BTreeSet<String> {
        &self.transports
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// The WebAuthn `user.id` this credential was created for: the owner's
    /// UUID bytes.
    pub fn user_handle(&self) -> &[u8] {
        self.owner.as_bytes()
    }

    pub fn attestation_format(&self) -> &str {
        &self.attestation_format
    }
}

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::api::authenticator_responses::{AuthenticationResponseJSON, RegistrationResponseJSON};
use crate::authenticator::attestation::{AttestationStatementVerifier, AttestationVerifierRegistry};
use crate::error::AuthenticationError;
use crate::relying_party::config::RelyingPartyConfig;
use crate::relying_party::credential::PublicKeyCredential;
use crate::relying_party::operation::assertion_response::AssertionResponse;
use crate::relying_party::store::challenges::ChallengesChannel;
use crate::relying_party::store::credentials::CredentialsChannel;
use crate::security::challenge::Challenge;

pub mod config;
pub mod credential;
pub mod operation;
pub mod store;

/// Entry point for both ceremonies. Owns the relying party policy and the
/// attestation verifiers it trusts.
#[derive(Debug)]
pub struct RelyingParty {
    config: RelyingPartyConfig,
    registry: AttestationVerifierRegistry,
}

impl RelyingParty {
    pub fn new(config: RelyingPartyConfig) -> Result<RelyingParty, AuthenticationError> {
        RelyingParty::with_registry(config, AttestationVerifierRegistry::new())
    }

    pub fn with_registry(
        config: RelyingPartyConfig,
        registry: AttestationVerifierRegistry,
    ) -> Result<RelyingParty, AuthenticationError> {
        config.validate()?;

        log::info!(
            "relying party {} | origins {:?} | attestation formats {:?}",
            config.rp_id,
            config.allowed_origins,
            registry.formats(),
        );

        Ok(RelyingParty { config, registry })
    }

    pub fn register_attestation_verifier<V>(&mut self, format: &str, verifier: V)
    where
        V: AttestationStatementVerifier + 'static,
    {
        self.registry.register(format, verifier);
    }

    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    pub fn registry(&self) -> &AttestationVerifierRegistry {
        &self.registry
    }

    /// Verifies a registration against an already consumed challenge. The
    /// returned credential is not persisted.
    pub fn create_credential(
        &self,
        client_data_json: &[u8],
        attestation_object: &[u8],
        challenge: &Challenge,
        transports: BTreeSet<String>,
        owner: Uuid,
    ) -> Result<PublicKeyCredential, AuthenticationError> {
        PublicKeyCredential::create(
            &self.config,
            &self.registry,
            client_data_json,
            attestation_object,
            challenge,
            transports,
            owner,
        )
    }

    /// Verifies an assertion against an already consumed challenge and moves
    /// `credential`'s sign count forward. Persisting it is up to the caller.
    pub fn authenticate_credential(
        &self,
        credential: &mut PublicKeyCredential,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        signature: &[u8],
        challenge: &Challenge,
    ) -> Result<(), AuthenticationError> {
        credential.authenticate(
            &self.config,
            client_data_json,
            authenticator_data,
            signature,
            challenge,
        )
    }

    pub async fn register_new_credential(
        &self,
        challenges: &ChallengesChannel,
        credentials: &CredentialsChannel,
        response: &RegistrationResponseJSON,
        challenge: &Challenge,
        owner: Uuid,
    ) -> Result<PublicKeyCredential, AuthenticationError> {
        let challenge = challenges.consume(challenge).await?;

        let client_data_json = response.client_data_json()?;
        let attestation_object = response.attestation_object()?;

        let credential = match self.create_credential(
            &client_data_json,
            &attestation_object,
            &challenge,
            response.transports(),
            owner,
        ) {
            Ok(credential) => credential,
            Err(error) => {
                log::warn!("registration failed for {} -> {}", owner, error);

                return Err(error);
            }
        };

        credentials.insert(credential.to_owned()).await?;

        Ok(credential)
    }

    /// Runs the authentication ceremony for a browser response and persists
    /// the new sign count. Returns the updated credential, whose owner is the
    /// authenticated user.
    pub async fn verify_authentication_assertion(
        &self,
        challenges: &ChallengesChannel,
        credentials: &CredentialsChannel,
        response: &AuthenticationResponseJSON,
        challenge: &Challenge,
    ) -> Result<PublicKeyCredential, AuthenticationError> {
        let challenge = challenges.consume(challenge).await?;

        let credential_id = response.credential_id()?;
        let client_data_json = response.client_data_json()?;
        let authenticator_data = response.authenticator_data()?;
        let signature = response.signature()?;
        let user_handle = response.user_handle()?;

        let mut credential = credentials.find_by_id(&credential_id).await?;
        let stored_sign_count = credential.sign_count();

        let assertion = AssertionResponse::new(&client_data_json, &authenticator_data, &signature)
            .credential_id(&credential_id)
            .user_handle(user_handle.as_deref());

        if let Err(error) = credential.authenticate_response(&self.config, &assertion, &challenge)
        {
            match error.error.requires_credential_suspension() {
                true => log::error!(
                    "authentication failed for {} -> {} | credential should be suspended",
                    credential.owner(),
                    error,
                ),
                false => log::warn!(
                    "authentication failed for {} -> {}",
                    credential.owner(),
                    error,
                ),
            }

            return Err(error);
        }

        credentials
            .update_sign_count(credential.id(), stored_sign_count, credential.sign_count())
            .await?;

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::attestation::PackedSelfAttestationVerifier;
    use crate::error::{AuthenticationErrorType, ClientDataField};
    use crate::relying_party::store::challenges::Challenges;
    use crate::relying_party::store::credentials::Credentials;
    use crate::testing::{SoftwareAuthenticator, TestKeyAlgorithm};

    const TEST_RP_ID: &str = "fizzy.test";
    const TEST_ORIGIN: &str = "https://fizzy.test";

    async fn test_stores() -> (ChallengesChannel, CredentialsChannel) {
        let (test_challenges_channel, mut test_challenges) = Challenges::init(300).await;
        let (test_credentials_channel, mut test_credentials) = Credentials::init().await;

        tokio::spawn(async move {
            test_challenges.run().await;
        });
        tokio::spawn(async move {
            test_credentials.run().await;
        });

        (test_challenges_channel, test_credentials_channel)
    }

    #[test]
    fn new() -> Result<(), Box<dyn std::error::Error>> {
        let test_relying_party =
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &[TEST_ORIGIN]))?;

        assert_eq!(test_relying_party.config().rp_id, TEST_RP_ID);
        assert_eq!(test_relying_party.registry().formats(), vec!["none"]);

        assert_eq!(
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &["https://example.test"]))
                .unwrap_err()
                .error,
            AuthenticationErrorType::InvalidConfiguration,
        );

        Ok(())
    }

    #[test]
    fn register_attestation_verifier() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_relying_party =
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &[TEST_ORIGIN]))?;

        test_relying_party.register_attestation_verifier("packed", PackedSelfAttestationVerifier);

        assert_eq!(
            test_relying_party.registry().formats(),
            vec!["none", "packed"],
        );

        Ok(())
    }

    #[test]
    fn create_and_authenticate_credential() -> Result<(), Box<dyn std::error::Error>> {
        let test_relying_party =
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &[TEST_ORIGIN]))?;
        let test_authenticator =
            SoftwareAuthenticator::new(TEST_RP_ID, TEST_ORIGIN, TestKeyAlgorithm::RS256);

        let test_challenge = Challenge::generate();
        let (test_client_data_json, test_attestation_object) =
            test_authenticator.make_credential(&test_challenge);
        let mut test_credential = test_relying_party.create_credential(
            &test_client_data_json,
            &test_attestation_object,
            &test_challenge,
            BTreeSet::new(),
            Uuid::new_v4(),
        )?;

        let test_challenge = Challenge::generate();
        let test_assertion = test_authenticator.get_assertion(&test_challenge, 1);

        test_relying_party.authenticate_credential(
            &mut test_credential,
            &test_assertion.client_data_json,
            &test_assertion.authenticator_data,
            &test_assertion.signature,
            &test_challenge,
        )?;

        assert_eq!(test_credential.sign_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn register_new_credential() -> Result<(), Box<dyn std::error::Error>> {
        let test_relying_party =
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &[TEST_ORIGIN]))?;
        let (test_challenges, test_credentials) = test_stores().await;
        let test_authenticator =
            SoftwareAuthenticator::new(TEST_RP_ID, TEST_ORIGIN, TestKeyAlgorithm::ES256);
        let test_owner = Uuid::new_v4();

        let test_challenge = test_challenges.issue().await?;
        let test_response = test_authenticator.registration_response(&test_challenge);
        let test_credential = test_relying_party
            .register_new_credential(
                &test_challenges,
                &test_credentials,
                &test_response,
                &test_challenge,
                test_owner,
            )
            .await?;

        assert_eq!(test_credential.owner(), test_owner);
        assert!(test_credential.transports().contains("internal"));
        assert_eq!(
            test_credentials
                .find_by_id(&test_authenticator.credential_id)
                .await?,
            test_credential,
        );

        assert_eq!(
            test_relying_party
                .register_new_credential(
                    &test_challenges,
                    &test_credentials,
                    &test_response,
                    &test_challenge,
                    test_owner,
                )
                .await
                .unwrap_err()
                .error,
            AuthenticationErrorType::ChallengeRejected,
        );

        let test_challenge = test_challenges.issue().await?;
        let test_response = test_authenticator.registration_response(&test_challenge);

        assert_eq!(
            test_relying_party
                .register_new_credential(
                    &test_challenges,
                    &test_credentials,
                    &test_response,
                    &test_challenge,
                    test_owner,
                )
                .await
                .unwrap_err()
                .error,
            AuthenticationErrorType::CredentialConflict,
        );

        Ok(())
    }

    #[tokio::test]
    async fn register_new_credential_wrong_challenge() -> Result<(), Box<dyn std::error::Error>> {
        let test_relying_party =
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &[TEST_ORIGIN]))?;
        let (test_challenges, test_credentials) = test_stores().await;
        let test_authenticator =
            SoftwareAuthenticator::new(TEST_RP_ID, TEST_ORIGIN, TestKeyAlgorithm::EdDSA);

        let test_issued = test_challenges.issue().await?;
        let test_response = test_authenticator.registration_response(&Challenge::generate());

        assert_eq!(
            test_relying_party
                .register_new_credential(
                    &test_challenges,
                    &test_credentials,
                    &test_response,
                    &test_issued,
                    Uuid::new_v4(),
                )
                .await
                .unwrap_err()
                .error,
            AuthenticationErrorType::InvalidClientData(ClientDataField::Challenge),
        );
        assert_eq!(
            test_credentials
                .find_by_id(&test_authenticator.credential_id)
                .await
                .unwrap_err()
                .error,
            AuthenticationErrorType::UnknownCredential,
        );

        Ok(())
    }

    #[tokio::test]
    async fn verify_authentication_assertion() -> Result<(), Box<dyn std::error::Error>> {
        let test_relying_party =
            RelyingParty::new(RelyingPartyConfig::new(TEST_RP_ID, &[TEST_ORIGIN]))?;
        let (test_challenges, test_credentials) = test_stores().await;
        let test_owner = Uuid::new_v4();
        let test_authenticator =
            SoftwareAuthenticator::new(TEST_RP_ID, TEST_ORIGIN, TestKeyAlgorithm::PS256)
                .with_user_handle(test_owner.as_bytes());

        let test_challenge = test_challenges.issue().await?;
        let test_response = test_authenticator.registration_response(&test_challenge);

        test_relying_party
            .register_new_credential(
                &test_challenges,
                &test_credentials,
                &test_response,
                &test_challenge,
                test_owner,
            )
            .await?;

        let test_challenge = test_challenges.issue().await?;
        let test_response = test_authenticator.authentication_response(&test_challenge, 1);
        let test_credential = test_relying_party
            .verify_authentication_assertion(
                &test_challenges,
                &test_credentials,
                &test_response,
                &test_challenge,
            )
            .await?;

        assert_eq!(test_credential.owner(), test_owner);
        assert_eq!(test_credential.sign_count(), 1);
        assert_eq!(
            test_credentials
                .find_by_id(&test_authenticator.credential_id)
                .await?
                .sign_count(),
            1,
        );

        let test_stranger =
            SoftwareAuthenticator::new(TEST_RP_ID, TEST_ORIGIN, TestKeyAlgorithm::ES256);
        let test_challenge = test_challenges.issue().await?;
        let test_response = test_stranger.authentication_response(&test_challenge, 1);

        assert_eq!(
            test_relying_party
                .verify_authentication_assertion(
                    &test_challenges,
                    &test_credentials,
                    &test_response,
                    &test_challenge,
                )
                .await
                .unwrap_err()
                .error,
            AuthenticationErrorType::UnknownCredential,
        );

        Ok(())
    }
}

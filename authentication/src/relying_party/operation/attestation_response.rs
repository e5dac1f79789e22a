use crate::api::supporting_data_structures::ClientDataType;
use crate::authenticator::attestation::{
    AttestationObject, AttestationVerifierRegistry, AttestedCredentialData, COSEKey,
};
use crate::authenticator::data::SignCount;
use crate::error::{AuthenticationError, AuthenticationErrorType};
use crate::relying_party::config::RelyingPartyConfig;
use crate::relying_party::operation::client_data::ClientDataValidator;
use crate::security::challenge::Challenge;

/// The verified outcome of a registration ceremony.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attestation {
    pub credential_id: Vec<u8>,
    pub public_key: COSEKey,
    pub sign_count: SignCount,
    pub attestation_format: String,
}

pub struct AttestationResponse<'a> {
    client_data_json: &'a [u8],
    attestation_object: &'a [u8],
}

impl<'a> AttestationResponse<'a> {
    pub fn new(client_data_json: &'a [u8], attestation_object: &'a [u8]) -> AttestationResponse<'a> {
        AttestationResponse {
            client_data_json,
            attestation_object,
        }
    }

    pub fn validate(
        &self,
        config: &RelyingPartyConfig,
        registry: &AttestationVerifierRegistry,
        challenge: &Challenge,
    ) -> Result<Attestation, AuthenticationError> {
        ClientDataValidator::from_config(config).parse_and_validate(
            self.client_data_json,
            ClientDataType::Create,
            challenge,
        )?;

        let attestation_object = AttestationObject::from_byte_array(self.attestation_object)?;
        let authenticator_data = &attestation_object.authenticator_data;

        authenticator_data.verify_rp_id_hash(&config.rp_id)?;
        authenticator_data.verify_user_present()?;
        authenticator_data.verify_user_verification(config.user_verification)?;

        let attested_credential_data = attestation_object.attested_credential_data()?;

        self.verify_algorithm(config, attested_credential_data)?;
        self.verify_attestation_statement(registry, &attestation_object)?;

        Ok(Attestation {
            credential_id: attested_credential_data.credential_id.to_owned(),
            public_key: attested_credential_data.credential_public_key.to_owned(),
            sign_count: authenticator_data.sign_count,
            attestation_format: attestation_object.format.to_owned(),
        })
    }

    pub fn verify_algorithm(
        &self,
        config: &RelyingPartyConfig,
        attested_credential_data: &AttestedCredentialData,
    ) -> Result<(), AuthenticationError> {
        let algorithm = attested_credential_data
            .credential_public_key
            .algorithm()
            .identifier();

        match config.allows_algorithm(algorithm) {
            true => Ok(()),
            false => {
                log::warn!("registration rejected | algorithm {} is not allowed", algorithm);

                Err(AuthenticationError {
                    error: AuthenticationErrorType::InvalidAttestationObject,
                })
            }
        }
    }

    pub fn verify_attestation_statement(
        &self,
        registry: &AttestationVerifierRegistry,
        attestation_object: &AttestationObject,
    ) -> Result<(), AuthenticationError> {
        let verifier = match registry.verifier_for(&attestation_object.format) {
            Ok(verifier) => verifier,
            Err(error) => {
                log::warn!(
                    "registration rejected | unsupported attestation format {:?}",
                    attestation_object.format,
                );

                return Err(error);
            }
        };

        verifier.verify(attestation_object, self.client_data_json)
    }
}

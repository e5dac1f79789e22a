use crate::authenticator::attestation::statement_format::AttestationStatementVerifier;
use crate::authenticator::attestation::AttestationObject;
use crate::error::{AuthenticationError, AuthenticationErrorType};

/// `none` carries no proof at all, so anything inside the statement is suspect.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoneAttestationStatementVerifier;

impl AttestationStatementVerifier for NoneAttestationStatementVerifier {
    fn verify(
        &self,
        attestation: &AttestationObject,
        _client_data_json: &[u8],
    ) -> Result<(), AuthenticationError> {
        match attestation.statement_is_empty() {
            true => Ok(()),
            false => {
                log::warn!("none attestation carried a non empty statement");

                Err(AuthenticationError {
                    error: AuthenticationErrorType::AttestationVerificationFailed,
                })
            }
        }
    }
}

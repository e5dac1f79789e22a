use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("{error}")]
pub struct AuthenticationError {
    pub error: AuthenticationErrorType,
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum AuthenticationErrorType {
    #[error("InvalidClientDataError ({0})")]
    InvalidClientData(ClientDataField),
    #[error("InvalidAttestationObjectError")]
    InvalidAttestationObject,
    #[error("RpIdMismatchError")]
    RpIdMismatch,
    #[error("UserPresenceRequiredError")]
    UserPresenceRequired,
    #[error("UserVerificationRequiredError")]
    UserVerificationRequired,
    #[error("UnsupportedAttestationFormatError")]
    UnsupportedAttestationFormat,
    #[error("AttestationVerificationFailedError")]
    AttestationVerificationFailed,
    #[error("UnknownCredentialError")]
    UnknownCredential,
    #[error("SignatureVerificationFailedError")]
    SignatureVerificationFailed,
    #[error("PossibleCloneDetectedError")]
    PossibleCloneDetected,
    #[error("InvalidConfigurationError")]
    InvalidConfiguration,
    #[error("ChallengeRejectedError")]
    ChallengeRejected,
    #[error("CredentialConflictError")]
    CredentialConflict,
    #[error("StoreUnavailableError")]
    StoreUnavailable,
}

impl AuthenticationErrorType {
    /// A possible clone means the credential itself is compromised, not just this ceremony.
    pub fn requires_credential_suspension(&self) -> bool {
        matches!(self, AuthenticationErrorType::PossibleCloneDetected)
    }
}

impl From<AuthenticationErrorType> for AuthenticationError {
    fn from(error: AuthenticationErrorType) -> AuthenticationError {
        AuthenticationError { error }
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ClientDataField {
    #[error("encoding")]
    Encoding,
    #[error("json")]
    Json,
    #[error("type")]
    Type,
    #[error("challenge")]
    Challenge,
    #[error("origin")]
    Origin,
    #[error("crossOrigin")]
    CrossOrigin,
}

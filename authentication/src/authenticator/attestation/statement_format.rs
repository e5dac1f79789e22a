use std::collections::HashMap;

use crate::authenticator::attestation::AttestationObject;
use crate::error::{AuthenticationError, AuthenticationErrorType};

pub use crate::authenticator::attestation::statement_format::none::NoneAttestationStatementVerifier;
pub use crate::authenticator::attestation::statement_format::packed::PackedSelfAttestationVerifier;

pub type AttestationStatementFormatIdentifier = String;

pub mod none;
pub mod packed;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttestationStatementFormat {
    Packed,
    None,
}

impl AttestationStatementFormat {
    pub fn identifier(&self) -> &'static str {
        match self {
            AttestationStatementFormat::Packed => "packed",
            AttestationStatementFormat::None => "none",
        }
    }
}

/// Checks the attestation statement of one format. Implementations receive the
/// decoded attestation object and the raw `clientDataJSON` bytes, whose hash
/// is part of whatever the authenticator signed.
pub trait AttestationStatementVerifier: Send + Sync {
    fn verify(
        &self,
        attestation: &AttestationObject,
        client_data_json: &[u8],
    ) -> Result<(), AuthenticationError>;
}

/// Format name to verifier mapping, owned by the relying party. Formats that
/// were never registered are rejected.
pub struct AttestationVerifierRegistry {
    verifiers: HashMap<AttestationStatementFormatIdentifier, Box<dyn AttestationStatementVerifier>>,
}

impl AttestationVerifierRegistry {
    pub fn new() -> AttestationVerifierRegistry {
        let mut registry = AttestationVerifierRegistry::empty();

        registry.register(
            AttestationStatementFormat::None.identifier(),
            NoneAttestationStatementVerifier,
        );

        registry
    }

    pub fn empty() -> AttestationVerifierRegistry {
        AttestationVerifierRegistry {
            verifiers: HashMap::with_capacity(2),
        }
    }

    /// Registers `verifier` for `format`, replacing any previous verifier.
    pub fn register<V>(&mut self, format: &str, verifier: V)
    where
        V: AttestationStatementVerifier + 'static,
    {
        if self
            .verifiers
            .insert(format.to_owned(), Box::new(verifier))
            .is_some()
        {
            log::info!("attestation verifier replaced -> {}", format);
        }
    }

    pub fn verifier_for(
        &self,
        format: &str,
    ) -> Result<&dyn AttestationStatementVerifier, AuthenticationError> {
        match self.verifiers.get(format) {
            Some(verifier) => Ok(verifier.as_ref()),
            None => Err(AuthenticationError {
                error: AuthenticationErrorType::UnsupportedAttestationFormat,
            }),
        }
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.verifiers.keys().map(String::as_str).collect();

        formats.sort_unstable();
        formats
    }
}

impl Default for AttestationVerifierRegistry {
    fn default() -> AttestationVerifierRegistry {
        AttestationVerifierRegistry::new()
    }
}

impl std::fmt::Debug for AttestationVerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationVerifierRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

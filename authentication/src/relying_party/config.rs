use serde::{Deserialize, Serialize};
use url::Url;

pub use crate::api::supporting_data_structures::UserVerificationRequirement;

use crate::api::supporting_data_structures::COSEAlgorithmIdentifier;
use crate::authenticator::attestation::COSEAlgorithm;
use crate::error::{AuthenticationError, AuthenticationErrorType};

pub const DEFAULT_CHALLENGE_TIMEOUT_SECONDS: u64 = 300;

/// Relying party policy. Loaded from TOML, for example:
///
/// ```toml
/// rp_id = "fizzy.test"
/// allowed_origins = ["https://fizzy.test", "https://app.fizzy.test"]
/// user_verification = "required"
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RelyingPartyConfig {
    pub rp_id: String,
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
    #[serde(default)]
    pub allow_cross_origin: bool,
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<COSEAlgorithmIdentifier>,
    #[serde(default = "default_challenge_timeout_seconds")]
    pub challenge_timeout_seconds: u64,
}

fn default_allowed_algorithms() -> Vec<COSEAlgorithmIdentifier> {
    [
        COSEAlgorithm::ES256,
        COSEAlgorithm::EdDSA,
        COSEAlgorithm::RS256,
        COSEAlgorithm::PS256,
    ]
    .iter()
    .map(|algorithm| algorithm.identifier())
    .collect()
}

fn default_challenge_timeout_seconds() -> u64 {
    DEFAULT_CHALLENGE_TIMEOUT_SECONDS
}

impl RelyingPartyConfig {
    pub fn new(rp_id: &str, allowed_origins: &[&str]) -> RelyingPartyConfig {
        RelyingPartyConfig {
            rp_id: rp_id.to_owned(),
            allowed_origins: allowed_origins
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            user_verification: UserVerificationRequirement::default(),
            allow_cross_origin: false,
            allowed_algorithms: default_allowed_algorithms(),
            challenge_timeout_seconds: DEFAULT_CHALLENGE_TIMEOUT_SECONDS,
        }
    }

    pub fn from_toml(contents: &str) -> Result<RelyingPartyConfig, AuthenticationError> {
        let config: RelyingPartyConfig = match basic_toml::from_str(contents) {
            Ok(config) => config,
            Err(error) => {
                log::warn!("relying party configuration | from_toml -> {}", error);

                return Err(invalid());
            }
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthenticationError> {
        if self.rp_id.is_empty() || self.rp_id.contains(['/', ':']) {
            log::warn!("relying party configuration | invalid rp_id {:?}", self.rp_id);

            return Err(invalid());
        }

        if self.allowed_origins.is_empty() {
            log::warn!("relying party configuration | no allowed origins");

            return Err(invalid());
        }

        if self.allowed_algorithms.is_empty() {
            log::warn!("relying party configuration | no allowed algorithms");

            return Err(invalid());
        }

        for origin in &self.allowed_origins {
            self.validate_origin(origin)?;
        }

        Ok(())
    }

    pub fn allows_algorithm(&self, algorithm: COSEAlgorithmIdentifier) -> bool {
        self.allowed_algorithms.contains(&algorithm)
    }

    /// Origins are compared byte for byte at ceremony time, so each entry has
    /// to already be in the serialized form a browser reports.
    fn validate_origin(&self, origin: &str) -> Result<(), AuthenticationError> {
        let url = match Url::parse(origin) {
            Ok(url) => url,
            Err(error) => {
                log::warn!("relying party configuration | {} -> {}", origin, error);

                return Err(invalid());
            }
        };

        let host = match url.host_str() {
            Some(host) => host,
            None => return Err(invalid_origin(origin, "missing host")),
        };

        match url.scheme() {
            "https" => {}
            "http" if host == "localhost" => {}
            _ => return Err(invalid_origin(origin, "scheme must be https")),
        }

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid_origin(origin, "path, query or fragment present"));
        }

        if url.origin().ascii_serialization() != origin {
            return Err(invalid_origin(origin, "not in serialized origin form"));
        }

        let registrable = host == self.rp_id || host.ends_with(&format!(".{}", self.rp_id));

        match registrable {
            true => Ok(()),
            false => Err(invalid_origin(origin, "host is not within rp_id")),
        }
    }
}

fn invalid_origin(origin: &str, reason: &str) -> AuthenticationError {
    log::warn!("relying party configuration | {} -> {}", origin, reason);

    invalid()
}

fn invalid() -> AuthenticationError {
    AuthenticationError {
        error: AuthenticationErrorType::InvalidConfiguration,
    }
}

use ciborium::value::Value;

use crate::api::supporting_data_structures::UserVerificationRequirement;
use crate::authenticator::attestation::AttestedCredentialData;
use crate::encoding::cbor::{Decoder, Limits};
use crate::error::{AuthenticationError, AuthenticationErrorType};
use crate::security::sha2::{constant_time_eq, generate_hash};

pub const UP: u8 = 0;
pub const UV: u8 = 2;
pub const BE: u8 = 3;
pub const BS: u8 = 4;
pub const AT: u8 = 6;
pub const ED: u8 = 7;

pub const RP_ID_HASH_LENGTH: usize = 32;
pub const MINIMUM_LENGTH: usize = RP_ID_HASH_LENGTH + 1 + 4;

pub type RpIdHash = [u8; 32];
pub type SignCount = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: RpIdHash,
    pub flags: u8,
    pub sign_count: SignCount,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Parses the authenticator data layout:
    ///
    /// | rpIdHash (32) | flags (1) | signCount (4, big endian) | attested credential data? | extensions? |
    pub fn from_byte_array(data: &[u8]) -> Result<AuthenticatorData, AuthenticationError> {
        let limits = Limits::default();

        if data.len() > limits.max_length {
            return Err(malformed("authenticator data exceeds maximum length"));
        }

        if data.len() < MINIMUM_LENGTH {
            return Err(malformed("authenticator data is truncated"));
        }

        let (rp_id_hash_bytes, remaining) = data.split_at(RP_ID_HASH_LENGTH);
        let (flags, remaining) = remaining.split_at(1);
        let (sign_count_bytes, mut remaining) = remaining.split_at(4);

        let mut rp_id_hash: RpIdHash = [0; RP_ID_HASH_LENGTH];
        let mut sign_count: [u8; 4] = [0; 4];

        rp_id_hash.copy_from_slice(rp_id_hash_bytes);
        sign_count.copy_from_slice(sign_count_bytes);

        let mut authenticator_data = AuthenticatorData {
            rp_id_hash,
            flags: flags[0],
            sign_count: u32::from_be_bytes(sign_count),
            attested_credential_data: None,
            extensions: None,
        };

        if authenticator_data.backup_state() && !authenticator_data.backup_eligible() {
            return Err(malformed("backup state set without backup eligibility"));
        }

        if authenticator_data.includes_attested_credential_data() {
            let (attested_credential_data, consumed) =
                AttestedCredentialData::from_byte_array(remaining)?;

            authenticator_data.attested_credential_data = Some(attested_credential_data);
            remaining = &remaining[consumed..];
        }

        if authenticator_data.includes_extension_data() {
            let mut decoder = match Decoder::new(remaining, limits) {
                Ok(decoder) => decoder,
                Err(error) => return Err(malformed(&error.to_string())),
            };
            let extensions = match decoder.decode_value() {
                Ok(extensions) => extensions,
                Err(error) => return Err(malformed(&error.to_string())),
            };

            if !matches!(extensions, Value::Map(_)) {
                return Err(malformed("extensions are not a map"));
            }

            authenticator_data.extensions = Some(extensions);
            remaining = decoder.remaining();
        }

        match remaining.is_empty() {
            true => Ok(authenticator_data),
            false => Err(malformed("trailing bytes after authenticator data")),
        }
    }

    pub fn user_present(&self) -> bool {
        (1 << UP & self.flags) > 0
    }

    pub fn user_verified(&self) -> bool {
        (1 << UV & self.flags) > 0
    }

    pub fn backup_eligible(&self) -> bool {
        (1 << BE & self.flags) > 0
    }

    pub fn backup_state(&self) -> bool {
        (1 << BS & self.flags) > 0
    }

    pub fn includes_attested_credential_data(&self) -> bool {
        (1 << AT & self.flags) > 0
    }

    pub fn includes_extension_data(&self) -> bool {
        (1 << ED & self.flags) > 0
    }

    pub fn verify_rp_id_hash(&self, rp_id: &str) -> Result<(), AuthenticationError> {
        let rp_id_hash = generate_hash(rp_id.as_bytes());

        match constant_time_eq(&self.rp_id_hash, &rp_id_hash) {
            true => Ok(()),
            false => Err(AuthenticationError {
                error: AuthenticationErrorType::RpIdMismatch,
            }),
        }
    }

    pub fn verify_user_present(&self) -> Result<(), AuthenticationError> {
        match self.user_present() {
            true => Ok(()),
            false => Err(AuthenticationError {
                error: AuthenticationErrorType::UserPresenceRequired,
            }),
        }
    }

    pub fn verify_user_verification(
        &self,
        requirement: UserVerificationRequirement,
    ) -> Result<(), AuthenticationError> {
        match requirement {
            UserVerificationRequirement::Required if !self.user_verified() => {
                Err(AuthenticationError {
                    error: AuthenticationErrorType::UserVerificationRequired,
                })
            }
            _ => Ok(()),
        }
    }
}

fn malformed(reason: &str) -> AuthenticationError {
    log::debug!("malformed authenticator data -> {}", reason);

    AuthenticationError {
        error: AuthenticationErrorType::InvalidAttestationObject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AuthenticatorDataBuilder, CredentialKeyPair, TestKeyAlgorithm};
    use ciborium::cbor;

    #[test]
    fn assertion_layout() -> Result<(), Box<dyn std::error::Error>> {
        let test_bytes = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP | 1 << UV)
            .sign_count(0x0102_0304)
            .build();

        assert_eq!(test_bytes.len(), MINIMUM_LENGTH);
        assert_eq!(&test_bytes[33..37], &[1, 2, 3, 4]);

        let test_authenticator_data = AuthenticatorData::from_byte_array(&test_bytes)?;

        assert_eq!(
            test_authenticator_data.rp_id_hash,
            generate_hash(b"fizzy.test")
        );
        assert_eq!(test_authenticator_data.sign_count, 0x0102_0304);
        assert!(test_authenticator_data.user_present());
        assert!(test_authenticator_data.user_verified());
        assert!(!test_authenticator_data.includes_attested_credential_data());
        assert!(test_authenticator_data.attested_credential_data.is_none());
        assert!(test_authenticator_data.extensions.is_none());

        Ok(())
    }

    #[test]
    fn attested_credential_data() -> Result<(), Box<dyn std::error::Error>> {
        let test_key_pair = CredentialKeyPair::generate(TestKeyAlgorithm::ES256);
        let test_bytes = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP)
            .sign_count(7)
            .attested_credential(&[9; 20], &test_key_pair.cose_key())
            .build();
        let test_authenticator_data = AuthenticatorData::from_byte_array(&test_bytes)?;

        assert!(test_authenticator_data.includes_attested_credential_data());
        assert_eq!(test_authenticator_data.sign_count, 7);

        let test_attested_credential_data = test_authenticator_data
            .attested_credential_data
            .ok_or("attested credential data")?;

        assert_eq!(test_attested_credential_data.credential_id, vec![9; 20]);
        assert_eq!(
            test_attested_credential_data.credential_public_key,
            test_key_pair.cose_key()
        );

        Ok(())
    }

    #[test]
    fn extensions() -> Result<(), Box<dyn std::error::Error>> {
        let test_extensions = cbor!({ "credProtect" => 2 })?;
        let test_bytes = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP)
            .extensions(&test_extensions)
            .build();
        let test_authenticator_data = AuthenticatorData::from_byte_array(&test_bytes)?;

        assert!(test_authenticator_data.includes_extension_data());
        assert_eq!(test_authenticator_data.extensions, Some(test_extensions));

        let mut test_not_a_map = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP | 1 << ED)
            .build();

        test_not_a_map.push(0x01);

        assert!(AuthenticatorData::from_byte_array(&test_not_a_map).is_err());

        Ok(())
    }

    #[test]
    fn reject_malformed_layouts() -> Result<(), Box<dyn std::error::Error>> {
        let test_bytes = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP)
            .build();

        // truncated
        assert!(AuthenticatorData::from_byte_array(&test_bytes[..36]).is_err());
        assert!(AuthenticatorData::from_byte_array(&[]).is_err());

        // trailing bytes without the extension flag
        let mut test_trailing = test_bytes.to_owned();
        test_trailing.push(0xa0);

        assert!(AuthenticatorData::from_byte_array(&test_trailing).is_err());

        // attested credential flag without attested credential data
        let test_missing = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP | 1 << AT)
            .build();

        assert!(AuthenticatorData::from_byte_array(&test_missing).is_err());

        // backup state without backup eligibility
        let test_backup = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP | 1 << BS)
            .build();

        assert!(AuthenticatorData::from_byte_array(&test_backup).is_err());

        // oversized
        let mut test_oversized = test_bytes;
        test_oversized.resize(Limits::default().max_length + 1, 0);

        assert_eq!(
            AuthenticatorData::from_byte_array(&test_oversized)
                .unwrap_err()
                .error,
            AuthenticationErrorType::InvalidAttestationObject,
        );

        Ok(())
    }

    #[test]
    fn reject_truncated_credential() -> Result<(), Box<dyn std::error::Error>> {
        let test_key_pair = CredentialKeyPair::generate(TestKeyAlgorithm::EdDSA);
        let test_bytes = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP)
            .attested_credential(&[1; 16], &test_key_pair.cose_key())
            .build();

        assert!(AuthenticatorData::from_byte_array(&test_bytes).is_ok());

        for test_length in [MINIMUM_LENGTH + 10, MINIMUM_LENGTH + 17, test_bytes.len() - 1] {
            assert_eq!(
                AuthenticatorData::from_byte_array(&test_bytes[..test_length])
                    .unwrap_err()
                    .error,
                AuthenticationErrorType::InvalidAttestationObject,
            );
        }

        Ok(())
    }

    #[test]
    fn verify_rp_id_hash() -> Result<(), Box<dyn std::error::Error>> {
        let test_bytes = AuthenticatorDataBuilder::new("fizzy.test")
            .flags(1 << UP)
            .build();
        let test_authenticator_data = AuthenticatorData::from_byte_array(&test_bytes)?;

        assert!(test_authenticator_data
            .verify_rp_id_hash("fizzy.test")
            .is_ok());
        assert_eq!(
            test_authenticator_data
                .verify_rp_id_hash("evil.test")
                .unwrap_err()
                .error,
            AuthenticationErrorType::RpIdMismatch,
        );

        Ok(())
    }

    #[test]
    fn verify_user_flags() -> Result<(), Box<dyn std::error::Error>> {
        let test_absent = AuthenticatorData::from_byte_array(
            &AuthenticatorDataBuilder::new("fizzy.test").flags(0).build(),
        )?;
        let test_present = AuthenticatorData::from_byte_array(
            &AuthenticatorDataBuilder::new("fizzy.test")
                .flags(1 << UP)
                .build(),
        )?;
        let test_verified = AuthenticatorData::from_byte_array(
            &AuthenticatorDataBuilder::new("fizzy.test")
                .flags(1 << UP | 1 << UV)
                .build(),
        )?;

        assert_eq!(
            test_absent.verify_user_present().unwrap_err().error,
            AuthenticationErrorType::UserPresenceRequired,
        );
        assert!(test_present.verify_user_present().is_ok());
        assert_eq!(
            test_present
                .verify_user_verification(UserVerificationRequirement::Required)
                .unwrap_err()
                .error,
            AuthenticationErrorType::UserVerificationRequired,
        );
        assert!(test_present
            .verify_user_verification(UserVerificationRequirement::Preferred)
            .is_ok());
        assert!(test_verified
            .verify_user_verification(UserVerificationRequirement::Required)
            .is_ok());

        Ok(())
    }

    #[test]
    fn flags() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(UP, 0);
        assert_eq!(UV, 2);
        assert_eq!(BE, 3);
        assert_eq!(BS, 4);
        assert_eq!(AT, 6);
        assert_eq!(ED, 7);

        let test_backed_up = AuthenticatorData::from_byte_array(
            &AuthenticatorDataBuilder::new("fizzy.test")
                .flags(1 << UP | 1 << BE | 1 << BS)
                .build(),
        )?;

        assert!(test_backed_up.backup_eligible());
        assert!(test_backed_up.backup_state());
        assert!(!test_backed_up.user_verified());

        Ok(())
    }
}

use crate::api::supporting_data_structures::{ClientDataType, CollectedClientData};
use crate::encoding::base64url;
use crate::error::{AuthenticationError, AuthenticationErrorType, ClientDataField};
use crate::relying_party::config::RelyingPartyConfig;
use crate::security::challenge::Challenge;

/// Checks the collected client data of either ceremony against what the
/// relying party issued and accepts.
#[derive(Clone, Debug)]
pub struct ClientDataValidator<'a> {
    allowed_origins: &'a [String],
    allow_cross_origin: bool,
}

impl<'a> ClientDataValidator<'a> {
    pub fn new(allowed_origins: &'a [String], allow_cross_origin: bool) -> ClientDataValidator<'a> {
        ClientDataValidator {
            allowed_origins,
            allow_cross_origin,
        }
    }

    pub fn from_config(config: &'a RelyingPartyConfig) -> ClientDataValidator<'a> {
        ClientDataValidator::new(&config.allowed_origins, config.allow_cross_origin)
    }

    pub fn parse_and_validate(
        &self,
        client_data_json: &[u8],
        expected_type: ClientDataType,
        expected_challenge: &Challenge,
    ) -> Result<CollectedClientData, AuthenticationError> {
        let client_data = CollectedClientData::from_json(client_data_json)?;

        self.validate(&client_data, expected_type, expected_challenge)?;

        Ok(client_data)
    }

    pub fn validate(
        &self,
        client_data: &CollectedClientData,
        expected_type: ClientDataType,
        expected_challenge: &Challenge,
    ) -> Result<(), AuthenticationError> {
        self.verify_type(client_data, expected_type)?;
        self.verify_challenge(client_data, expected_challenge)?;
        self.verify_origin(client_data)?;
        self.verify_cross_origin(client_data)?;

        Ok(())
    }

    pub fn verify_type(
        &self,
        client_data: &CollectedClientData,
        expected_type: ClientDataType,
    ) -> Result<(), AuthenticationError> {
        match client_data.r#type == expected_type.literal() {
            true => Ok(()),
            false => Err(invalid(ClientDataField::Type)),
        }
    }

    pub fn verify_challenge(
        &self,
        client_data: &CollectedClientData,
        expected_challenge: &Challenge,
    ) -> Result<(), AuthenticationError> {
        let presented = match base64url::decode(&client_data.challenge) {
            Ok(presented) => presented,
            Err(_) => return Err(invalid(ClientDataField::Challenge)),
        };

        match expected_challenge.matches(&presented) {
            true => Ok(()),
            false => Err(invalid(ClientDataField::Challenge)),
        }
    }

    pub fn verify_origin(&self, client_data: &CollectedClientData) -> Result<(), AuthenticationError> {
        match self
            .allowed_origins
            .iter()
            .any(|allowed_origin| *allowed_origin == client_data.origin)
        {
            true => Ok(()),
            false => Err(invalid(ClientDataField::Origin)),
        }
    }

    pub fn verify_cross_origin(
        &self,
        client_data: &CollectedClientData,
    ) -> Result<(), AuthenticationError> {
        match !client_data.is_cross_origin() || self.allow_cross_origin {
            true => Ok(()),
            false => Err(invalid(ClientDataField::CrossOrigin)),
        }
    }
}

fn invalid(field: ClientDataField) -> AuthenticationError {
    log::warn!("client data validation failed -> {}", field);

    AuthenticationError {
        error: AuthenticationErrorType::InvalidClientData(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client_data(r#type: &str, challenge: &Challenge, origin: &str) -> CollectedClientData {
        CollectedClientData {
            r#type: r#type.to_owned(),
            challenge: challenge.to_base64url(),
            origin: origin.to_owned(),
            cross_origin: None,
            top_origin: None,
        }
    }

    fn field(result: Result<(), AuthenticationError>) -> Option<AuthenticationErrorType> {
        result.err().map(|error| error.error)
    }

    #[test]
    fn validate() -> Result<(), Box<dyn std::error::Error>> {
        let test_allowed_origins = vec![String::from("https://fizzy.test")];
        let test_validator = ClientDataValidator::new(&test_allowed_origins, false);
        let test_challenge = Challenge::generate();

        assert!(test_validator
            .validate(
                &test_client_data("webauthn.create", &test_challenge, "https://fizzy.test"),
                ClientDataType::Create,
                &test_challenge,
            )
            .is_ok());
        assert!(test_validator
            .validate(
                &test_client_data("webauthn.get", &test_challenge, "https://fizzy.test"),
                ClientDataType::Get,
                &test_challenge,
            )
            .is_ok());

        Ok(())
    }

    #[test]
    fn verify_type() -> Result<(), Box<dyn std::error::Error>> {
        let test_allowed_origins = vec![String::from("https://fizzy.test")];
        let test_validator = ClientDataValidator::new(&test_allowed_origins, false);
        let test_challenge = Challenge::generate();

        for (test_type, test_expected) in [
            ("webauthn.get", ClientDataType::Create),
            ("webauthn.create", ClientDataType::Get),
            ("WEBAUTHN.GET", ClientDataType::Get),
            ("", ClientDataType::Get),
        ] {
            assert_eq!(
                field(test_validator.validate(
                    &test_client_data(test_type, &test_challenge, "https://fizzy.test"),
                    test_expected,
                    &test_challenge,
                )),
                Some(AuthenticationErrorType::InvalidClientData(ClientDataField::Type)),
            );
        }

        Ok(())
    }

    #[test]
    fn verify_challenge() -> Result<(), Box<dyn std::error::Error>> {
        let test_allowed_origins = vec![String::from("https://fizzy.test")];
        let test_validator = ClientDataValidator::new(&test_allowed_origins, false);
        let test_challenge = Challenge::from_bytes(&[7; 16])?;
        let test_expected = Some(AuthenticationErrorType::InvalidClientData(
            ClientDataField::Challenge,
        ));

        for test_index in 0..16 {
            let mut test_bytes = [7; 16];

            test_bytes[test_index] ^= 0x01;

            let test_flipped = Challenge::from_bytes(&test_bytes)?;

            assert_eq!(
                field(test_validator.verify_challenge(
                    &test_client_data("webauthn.get", &test_flipped, "https://fizzy.test"),
                    &test_challenge,
                )),
                test_expected,
            );
        }

        let mut test_undecodable =
            test_client_data("webauthn.get", &test_challenge, "https://fizzy.test");

        test_undecodable.challenge = String::from("!!not base64url!!");

        assert_eq!(
            field(test_validator.verify_challenge(&test_undecodable, &test_challenge)),
            test_expected,
        );

        let mut test_longer = test_client_data("webauthn.get", &test_challenge, "https://fizzy.test");

        test_longer.challenge = base64url::encode(&[7; 17]);

        assert_eq!(
            field(test_validator.verify_challenge(&test_longer, &test_challenge)),
            test_expected,
        );

        Ok(())
    }

    #[test]
    fn verify_origin() -> Result<(), Box<dyn std::error::Error>> {
        let test_allowed_origins = vec![
            String::from("https://fizzy.test"),
            String::from("https://login.fizzy.test"),
        ];
        let test_validator = ClientDataValidator::new(&test_allowed_origins, false);
        let test_challenge = Challenge::generate();

        for test_origin in ["https://fizzy.test", "https://login.fizzy.test"] {
            assert!(test_validator
                .verify_origin(&test_client_data("webauthn.get", &test_challenge, test_origin))
                .is_ok());
        }

        for test_origin in [
            "https://fizzy.test:8443",
            "http://fizzy.test",
            "https://fizzy.test/",
            "https://FIZZY.test",
            "https://evil.test",
            "",
        ] {
            assert_eq!(
                field(test_validator.verify_origin(&test_client_data(
                    "webauthn.get",
                    &test_challenge,
                    test_origin,
                ))),
                Some(AuthenticationErrorType::InvalidClientData(ClientDataField::Origin)),
            );
        }

        Ok(())
    }

    #[test]
    fn verify_cross_origin() -> Result<(), Box<dyn std::error::Error>> {
        let test_allowed_origins = vec![String::from("https://fizzy.test")];
        let test_challenge = Challenge::generate();
        let mut test_client_data =
            test_client_data("webauthn.get", &test_challenge, "https://fizzy.test");

        test_client_data.cross_origin = Some(false);

        assert!(ClientDataValidator::new(&test_allowed_origins, false)
            .verify_cross_origin(&test_client_data)
            .is_ok());

        test_client_data.cross_origin = Some(true);

        assert_eq!(
            field(
                ClientDataValidator::new(&test_allowed_origins, false)
                    .verify_cross_origin(&test_client_data)
            ),
            Some(AuthenticationErrorType::InvalidClientData(
                ClientDataField::CrossOrigin
            )),
        );
        assert!(ClientDataValidator::new(&test_allowed_origins, true)
            .verify_cross_origin(&test_client_data)
            .is_ok());

        Ok(())
    }

    #[test]
    fn parse_and_validate() -> Result<(), Box<dyn std::error::Error>> {
        let test_config = RelyingPartyConfig::new("fizzy.test", &["https://fizzy.test"]);
        let test_validator = ClientDataValidator::from_config(&test_config);
        let test_challenge = Challenge::generate();
        let test_json = serde_json::to_vec(&test_client_data(
            "webauthn.create",
            &test_challenge,
            "https://fizzy.test",
        ))?;

        let test_parsed = test_validator.parse_and_validate(
            &test_json,
            ClientDataType::Create,
            &test_challenge,
        )?;

        assert_eq!(test_parsed.origin, "https://fizzy.test");
        assert_eq!(
            test_validator
                .parse_and_validate(b"{", ClientDataType::Create, &test_challenge)
                .unwrap_err()
                .error,
            AuthenticationErrorType::InvalidClientData(ClientDataField::Json),
        );

        Ok(())
    }
}

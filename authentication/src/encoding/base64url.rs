use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{DecodeError, Engine};

/// Browsers differ on whether they pad base64url, so decoding accepts both.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode(data: &[u8]) -> String {
    BASE64URL.encode(data)
}

pub fn decode(data: &str) -> Result<Vec<u8>, DecodeError> {
    BASE64URL.decode(data)
}

pub mod assertion_response;
pub mod attestation_response;
pub mod client_data;

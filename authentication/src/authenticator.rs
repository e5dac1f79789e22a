pub mod attestation;
pub mod data;

pub mod challenge;
pub mod sha2;

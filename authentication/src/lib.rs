pub mod api;
pub mod authenticator;
pub mod encoding;
pub mod error;
pub mod relying_party;
pub mod security;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

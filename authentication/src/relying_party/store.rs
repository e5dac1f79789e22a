pub mod challenges;
pub mod credentials;

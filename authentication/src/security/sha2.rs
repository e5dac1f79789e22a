use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub type Hash = [u8; 32];

pub fn generate_hash(message: &[u8]) -> Hash {
    let mut digest = Sha256::new();
    let mut hash: Hash = [0; 32];

    digest.update(message);
    hash.copy_from_slice(&digest.finalize());

    hash
}

/// Length is not treated as secret; contents are compared in constant time.
pub fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.ct_eq(right).into()
}

#![forbid(unsafe_code)]

use docket_kernel_contracts::account::CredentialHash;
use docket_kernel_contracts::ContractViolation;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::codec::{from_hex, to_hex};

/// PBKDF2-HMAC-SHA256 work factor for newly created credentials. Stored
/// credentials carry their own iteration count, so this can be raised
/// without invalidating existing records.
pub const CREDENTIAL_ITERATIONS: u32 = 120_000;

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
const HMAC_BLOCK_LEN: usize = 64;

/// Hashes a password with a fresh random salt. The plain password never
/// leaves this function.
pub fn hash_password(password: &str) -> Result<CredentialHash, ContractViolation> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    hash_password_with(password, &salt, CREDENTIAL_ITERATIONS)
}

pub fn hash_password_with(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<CredentialHash, ContractViolation> {
    if password.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field: "password",
            reason: "must not be empty",
        });
    }
    if iterations == 0 {
        return Err(ContractViolation::InvalidValue {
            field: "credential_iterations",
            reason: "must be > 0",
        });
    }
    let digest = pbkdf2_sha256(password.as_bytes(), salt, iterations);
    CredentialHash::new(&format!(
        "pbkdf2-sha256${iterations}${}${}",
        to_hex(salt),
        to_hex(&digest)
    ))
}

/// Recomputes the digest from the stored salt and iteration count and
/// compares in constant time. Any parse failure verifies false.
pub fn verify_password(password: &str, credential: &CredentialHash) -> bool {
    let mut parts = credential.as_str().split('$');
    let _scheme = parts.next();
    let Some(iterations) = parts.next().and_then(|raw| raw.parse::<u32>().ok()) else {
        return false;
    };
    let Some(salt) = parts.next().and_then(|raw| from_hex(raw).ok()) else {
        return false;
    };
    let Some(expected) = parts.next().and_then(|raw| from_hex(raw).ok()) else {
        return false;
    };
    if iterations == 0 || expected.len() != DIGEST_LEN {
        return false;
    }
    let got = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
    constant_time_eq(&got, &expected)
}

/// PBKDF2 (RFC 2898) with HMAC-SHA256, single 32-byte output block.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut block_input = Vec::with_capacity(salt.len() + 4);
    block_input.extend_from_slice(salt);
    block_input.extend_from_slice(&1u32.to_be_bytes());

    let mut u = hmac_sha256(password, &block_input);
    let mut out = u;
    for _ in 1..iterations {
        u = hmac_sha256(password, &u);
        for (acc, byte) in out.iter_mut().zip(u.iter()) {
            *acc ^= byte;
        }
    }
    out
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; DIGEST_LEN] {
    let mut key_block = [0u8; HMAC_BLOCK_LEN];
    if key.len() > HMAC_BLOCK_LEN {
        let digest = Sha256::digest(key);
        key_block[..DIGEST_LEN].copy_from_slice(&digest);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    let ipad: Vec<u8> = key_block.iter().map(|b| b ^ 0x36).collect();
    inner.update(&ipad);
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    let opad: Vec<u8> = key_block.iter().map(|b| b ^ 0x5c).collect();
    outer.update(&opad);
    outer.update(inner_digest);

    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&outer.finalize());
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

#[cfg(test)]
mod tests {
    use super::{hash_password, hash_password_with, verify_password};

    #[test]
    fn at_credential_01_verify_accepts_only_the_original_password() {
        let credential = hash_password_with("correct horse", b"salt0123", 1_000).unwrap();
        assert!(verify_password("correct horse", &credential));
        assert!(!verify_password("correct horsf", &credential));
        assert!(!verify_password("", &credential));
    }

    #[test]
    fn at_credential_02_fresh_salts_differ_but_both_verify() {
        let a = hash_password("shared password").unwrap();
        let b = hash_password("shared password").unwrap();
        assert_ne!(a.as_str(), b.as_str());
        assert!(verify_password("shared password", &a));
        assert!(verify_password("shared password", &b));
    }

    #[test]
    fn at_credential_03_encoded_form_never_contains_plaintext() {
        let credential = hash_password_with("SENTINEL_PLAINTEXT", b"saltsalt", 1_000).unwrap();
        assert!(!credential.as_str().contains("SENTINEL_PLAINTEXT"));
    }

    #[test]
    fn at_credential_04_pbkdf2_matches_rfc_test_vector() {
        // RFC 7914 §11 / RFC 6070-style vector for PBKDF2-HMAC-SHA256:
        // P="password", S="salt", c=1 -> 120fb6cffcf8b32c43e7225256c4f837a86548c9
        let credential = hash_password_with("password", b"salt", 1).unwrap();
        let digest = credential.as_str().split('$').nth(3).unwrap();
        assert!(digest.starts_with("120fb6cffcf8b32c43e7225256c4f837a86548c9"));
    }
}

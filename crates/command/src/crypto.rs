//! Cryptographic collaborators consumed by commands: public key parsing,
//! secret hashing and secret generation.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
use spki::der::Decode;
use spki::{ObjectIdentifier, SubjectPublicKeyInfoRef};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{CommandError, CommandResult};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Not a PEM `PUBLIC KEY` block holding an RSA or ECDSA SubjectPublicKeyInfo.
    #[error("invalid public key format: {0}")]
    PublicKeyFormat(String),
}

impl From<KeyError> for CommandError {
    fn from(err: KeyError) -> Self {
        CommandError::invalid_argument(err.to_string())
    }
}

/// Fingerprint of a PEM encoded public key:
/// `"SHA256:" + base64(sha256(DER))` without padding.
///
/// Only RSA and ECDSA SubjectPublicKeyInfo blocks are accepted.
pub fn public_key_fingerprint(pem_key: &[u8]) -> Result<String, KeyError> {
    let block = pem::parse(pem_key).map_err(|e| KeyError::PublicKeyFormat(e.to_string()))?;
    if block.tag() != "PUBLIC KEY" {
        return Err(KeyError::PublicKeyFormat(format!(
            "unexpected PEM block '{}'",
            block.tag()
        )));
    }

    let der = block.contents();
    let info = SubjectPublicKeyInfoRef::from_der(der)
        .map_err(|e| KeyError::PublicKeyFormat(e.to_string()))?;
    let algorithm = info.algorithm.oid;
    if algorithm != RSA_ENCRYPTION && algorithm != EC_PUBLIC_KEY {
        return Err(KeyError::PublicKeyFormat(format!(
            "unsupported key algorithm {algorithm}"
        )));
    }

    let digest = Sha256::digest(der);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}

/// Opaque one-way hashing of secrets (recovery codes).
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> CommandResult<String>;

    fn verify(&self, secret: &str, hashed: &str) -> bool;
}

/// Unsalted SHA-256, base64 encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256SecretHasher;

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &str) -> CommandResult<String> {
        Ok(STANDARD.encode(Sha256::digest(secret.as_bytes())))
    }

    fn verify(&self, secret: &str, hashed: &str) -> bool {
        self.hash(secret).is_ok_and(|h| h == hashed)
    }
}

/// Produces plain-text secrets handed out once to the user.
pub trait SecretGenerator: Send + Sync {
    fn generate(&self, length: usize) -> CommandResult<String>;
}

/// Uppercase alphanumeric codes cut from random UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSecretGenerator;

impl SecretGenerator for UuidSecretGenerator {
    fn generate(&self, length: usize) -> CommandResult<String> {
        let mut code = String::with_capacity(length + 32);
        while code.len() < length {
            code.push_str(&Uuid::new_v4().simple().to_string().to_uppercase());
        }
        code.truncate(length);
        Ok(code)
    }
}


#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;
    use warden_core::ErrorKind;

    #[test]
    fn rsa_and_ecdsa_keys_are_fingerprinted() {
        assert_eq!(
            public_key_fingerprint(RSA_2048.as_bytes()).unwrap(),
            RSA_2048_FINGERPRINT
        );
        assert_eq!(
            public_key_fingerprint(EC_P256.as_bytes()).unwrap(),
            EC_P256_FINGERPRINT
        );
        assert_eq!(
            public_key_fingerprint(EC_P384.as_bytes()).unwrap(),
            EC_P384_FINGERPRINT
        );
    }

    #[test]
    fn fingerprint_is_sha256_of_the_der_bytes() {
        let der = pem::parse(EC_P256).unwrap().into_contents();
        let expected = format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(&der)));
        assert_eq!(public_key_fingerprint(EC_P256.as_bytes()).unwrap(), expected);
        assert!(!expected.ends_with('='));
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let err = public_key_fingerprint(ED25519.as_bytes()).unwrap_err();
        assert!(matches!(err, KeyError::PublicKeyFormat(_)));
        assert_eq!(CommandError::from(err).kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn non_pem_input_is_rejected() {
        assert!(public_key_fingerprint(b"ssh-rsa AAAAB3NzaC1yc2E").is_err());
        assert!(public_key_fingerprint(b"").is_err());
    }

    #[test]
    fn other_pem_blocks_are_rejected() {
        let cert = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        assert!(public_key_fingerprint(cert.as_bytes()).is_err());
    }

    #[test]
    fn garbage_der_is_rejected() {
        let garbage = "-----BEGIN PUBLIC KEY-----\nAAECAwQF\n-----END PUBLIC KEY-----\n";
        assert!(public_key_fingerprint(garbage.as_bytes()).is_err());
    }

    #[test]
    fn hasher_verifies_its_own_hashes() {
        let hasher = Sha256SecretHasher;
        let hashed = hasher.hash("ABCDEFGHIJ").unwrap();
        assert_ne!(hashed, "ABCDEFGHIJ");
        assert!(hasher.verify("ABCDEFGHIJ", &hashed));
        assert!(!hasher.verify("ABCDEFGHIK", &hashed));
    }

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        let code = UuidSecretGenerator.generate(40).unwrap();
        assert_eq!(code.len(), 40);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(code, UuidSecretGenerator.generate(40).unwrap());
    }
}

//! Credential handshake.
//!
//! The device never receives the plaintext password. Login submits a token
//! encrypted with material the device embeds in its login page: a PBKDF2 key
//! derived from the page salt, AES-GCM under the page IV, with the page
//! nonce bound as associated data. The exact scheme differs between vendor
//! families, so the cipher parameters live in a per-family [`CipherProfile`]
//! rather than at the call sites.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::models::{Credential, CryptoMaterial};

/// Cipher parameters for one vendor/firmware family.
#[derive(Debug, Clone, Copy)]
pub struct CipherProfile {
    pub kdf_iterations: u32,
    pub key_len: usize,
}

/// Arris-family firmware: PBKDF2-SHA256, 1000 rounds, AES-128-GCM.
pub const ARRIS_PROFILE: CipherProfile = CipherProfile {
    kdf_iterations: 1000,
    key_len: 16,
};

const NONCE_LEN: usize = 12;

/// Derive the single-use login token. Deterministic for fixed inputs; no
/// input is retained after returning. Fails before any cipher work if the
/// material is incomplete or malformed.
pub fn derive_credential(
    username: &str,
    password: &str,
    material: &CryptoMaterial,
    profile: &CipherProfile,
) -> Result<Credential> {
    if let Some(field) = material.missing_field() {
        return Err(Error::AuthSetup(format!(
            "login page is missing crypto material field '{field}'"
        )));
    }

    let salt = hex::decode(&material.salt)
        .map_err(|_| Error::AuthSetup("salt is not valid hex".into()))?;
    let iv = hex::decode(&material.iv)
        .map_err(|_| Error::AuthSetup("iv is not valid hex".into()))?;
    if iv.len() < NONCE_LEN {
        return Err(Error::AuthSetup(format!(
            "iv must be at least {NONCE_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let mut key = vec![0u8; profile.key_len];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, profile.kdf_iterations, &mut key);

    let cipher = Aes128Gcm::new_from_slice(&key)
        .map_err(|_| Error::AuthSetup("cipher profile key length is invalid".into()))?;

    let plaintext = format!("{username}:{password}");
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&iv[..NONCE_LEN]),
            Payload {
                msg: plaintext.as_bytes(),
                aad: material.nonce.as_bytes(),
            },
        )
        .map_err(|_| Error::AuthSetup("credential encryption failed".into()))?;

    Ok(Credential(hex::encode(ciphertext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> CryptoMaterial {
        CryptoMaterial {
            nonce: "n1".into(),
            iv: "aabbccddeeff00112233445566778899".into(),
            salt: "00112233445566778899aabbccddeeff".into(),
            session_id: "sid1".into(),
        }
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let a = derive_credential("admin", "pw1", &material(), &ARRIS_PROFILE).unwrap();
        let b = derive_credential("admin", "pw1", &material(), &ARRIS_PROFILE).unwrap();
        assert_eq!(a, b);
        assert!(!a.0.is_empty());
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn any_input_change_changes_output() {
        let base = derive_credential("admin", "pw1", &material(), &ARRIS_PROFILE).unwrap();

        let other_pw = derive_credential("admin", "pw2", &material(), &ARRIS_PROFILE).unwrap();
        assert_ne!(base, other_pw);

        let other_user = derive_credential("root", "pw1", &material(), &ARRIS_PROFILE).unwrap();
        assert_ne!(base, other_user);

        let mut m = material();
        m.nonce = "n2".into();
        let other_nonce = derive_credential("admin", "pw1", &m, &ARRIS_PROFILE).unwrap();
        assert_ne!(base, other_nonce);

        let mut m = material();
        m.salt = "ffeeddccbbaa99887766554433221100".into();
        let other_salt = derive_credential("admin", "pw1", &m, &ARRIS_PROFILE).unwrap();
        assert_ne!(base, other_salt);
    }

    #[test]
    fn missing_material_fails_before_cipher_work() {
        let mut m = material();
        m.salt = String::new();
        let err = derive_credential("admin", "pw1", &m, &ARRIS_PROFILE).unwrap_err();
        assert!(matches!(err, Error::AuthSetup(ref msg) if msg.contains("salt")));
    }

    #[test]
    fn malformed_material_is_rejected() {
        let mut m = material();
        m.salt = "not-hex!".into();
        assert!(matches!(
            derive_credential("admin", "pw1", &m, &ARRIS_PROFILE),
            Err(Error::AuthSetup(_))
        ));

        let mut m = material();
        m.iv = "aabb".into(); // decodes, but far too short
        assert!(matches!(
            derive_credential("admin", "pw1", &m, &ARRIS_PROFILE),
            Err(Error::AuthSetup(_))
        ));
    }
}

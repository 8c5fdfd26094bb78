//! Encrypted-at-rest storage for the provider API key.
//!
//! The plaintext key is never written to disk. It is sealed with AES-256-GCM
//! under a key derived (HKDF-SHA256) from a per-installation secret that is
//! generated on first use, and decrypted only in memory on read.

use std::fs;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::hkdf::{HKDF_SHA256, Salt};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tracing::warn;

const SECRET_FILE: &str = ".secret";
const CREDENTIALS_FILE: &str = "credentials";
const KEY_DERIVATION_SALT: &[u8] = b"semsearch-credential-v1";
const KEY_DERIVATION_INFO: &[u8] = b"api-key-at-rest";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cryptographic operation failed")]
    Crypto,
    #[error("Stored credential is malformed")]
    Malformed,
}

impl From<ring::error::Unspecified> for CredentialError {
    #[inline]
    fn from(_: ring::error::Unspecified) -> Self {
        Self::Crypto
    }
}

/// File-backed store for the encrypted provider API key.
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    base_dir: PathBuf,
}

impl ApiKeyStore {
    #[inline]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Store the API key encrypted. Storing an empty key removes any stored
    /// credential.
    #[inline]
    pub fn store_api_key(&self, api_key: &str) -> Result<(), CredentialError> {
        let path = self.base_dir.join(CREDENTIALS_FILE);

        if api_key.is_empty() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            return Ok(());
        }

        let sealed = self.seal(api_key)?;
        fs::create_dir_all(&self.base_dir)?;
        fs::write(&path, sealed)?;
        restrict_permissions(&path)?;

        Ok(())
    }

    /// Read and decrypt the stored API key. Returns `None` when no credential
    /// is stored, or when the stored blob can no longer be decrypted (e.g.
    /// the installation secret was rotated).
    #[inline]
    pub fn get_api_key(&self) -> Result<Option<String>, CredentialError> {
        let path = self.base_dir.join(CREDENTIALS_FILE);

        if !path.exists() {
            return Ok(None);
        }

        let sealed = fs::read_to_string(&path)?;

        match self.open(sealed.trim()) {
            Ok(key) => Ok(Some(key)),
            Err(CredentialError::Io(e)) => Err(CredentialError::Io(e)),
            Err(e) => {
                warn!("Stored API key could not be decrypted: {}", e);
                Ok(None)
            }
        }
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        matches!(self.get_api_key(), Ok(Some(_)))
    }

    /// Render a key for display as `sk-a****...****wxyz`.
    #[inline]
    pub fn mask(api_key: &str) -> String {
        let chars: Vec<char> = api_key.chars().collect();

        if chars.len() < 8 {
            return "*".repeat(chars.len());
        }

        let head: String = chars.iter().take(4).collect();
        let tail: String = chars.iter().skip(chars.len() - 4).collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
    }

    fn seal(&self, plaintext: &str) -> Result<String, CredentialError> {
        let key = self.derived_key()?;

        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )?;

        let mut blob = nonce_bytes.to_vec();
        blob.extend_from_slice(&in_out);

        Ok(BASE64.encode(blob))
    }

    fn open(&self, sealed: &str) -> Result<String, CredentialError> {
        let blob = BASE64
            .decode(sealed)
            .map_err(|_| CredentialError::Malformed)?;

        if blob.len() <= NONCE_LEN {
            return Err(CredentialError::Malformed);
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)?;

        let key = self.derived_key()?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = key.open_in_place(nonce, Aad::empty(), &mut in_out)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CredentialError::Malformed)
    }

    fn derived_key(&self) -> Result<LessSafeKey, CredentialError> {
        let secret = self.machine_secret()?;

        let prk = Salt::new(HKDF_SHA256, KEY_DERIVATION_SALT).extract(&secret);
        let info: [&[u8]; 1] = [KEY_DERIVATION_INFO];
        let okm = prk.expand(&info, HKDF_SHA256)?;

        let mut key_bytes = [0u8; 32];
        okm.fill(&mut key_bytes)?;

        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Per-installation random secret, generated on first use.
    fn machine_secret(&self) -> Result<Vec<u8>, CredentialError> {
        let path = self.base_dir.join(SECRET_FILE);

        if path.exists() {
            let encoded = fs::read_to_string(&path)?;
            return hex::decode(encoded.trim()).map_err(|_| CredentialError::Malformed);
        }

        let rng = SystemRandom::new();
        let mut secret = [0u8; 32];
        rng.fill(&mut secret)?;

        fs::create_dir_all(&self.base_dir)?;
        fs::write(&path, hex::encode(secret))?;
        restrict_permissions(&path)?;

        Ok(secret.to_vec())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

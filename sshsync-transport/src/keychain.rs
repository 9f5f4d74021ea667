//! Ordered private-key store handed to the transport at dial time.
//!
//! Keys keep the index they were loaded at; public-key and signing
//! operations are addressed by that index.

use std::fmt;
use std::path::{Path, PathBuf};

use signature::Signer as _;
use ssh_key::{HashAlg, PrivateKey, PublicKey, Signature};

use crate::error::{read_err, KeyError};

/// A private key together with the file it came from.
#[derive(Clone)]
pub struct LoadedKey {
    pub path: PathBuf,
    pub private_key: PrivateKey,
}

impl fmt::Debug for LoadedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedKey")
            .field("path", &self.path)
            .field(
                "fingerprint",
                &self.private_key.fingerprint(HashAlg::Sha256).to_string(),
            )
            .finish()
    }
}

/// Ordered, index-stable list of loaded keys.
#[derive(Debug, Clone, Default)]
pub struct KeyChain {
    keys: Vec<LoadedKey>,
}

impl KeyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a keychain holding the single key at `path`.
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        let mut chain = Self::new();
        chain.load_pem(path)?;
        Ok(chain)
    }

    /// Parse one OpenSSH PEM private key and append it.
    ///
    /// The keychain is left untouched when reading or parsing fails.
    pub fn load_pem(&mut self, path: &Path) -> Result<(), KeyError> {
        let pem = std::fs::read(path).map_err(|e| read_err(path, e))?;
        let private_key = PrivateKey::from_openssh(&pem).map_err(|source| KeyError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if private_key.is_encrypted() {
            return Err(KeyError::Encrypted {
                path: path.to_path_buf(),
            });
        }
        self.keys.push(LoadedKey {
            path: path.to_path_buf(),
            private_key,
        });
        Ok(())
    }

    /// Public half of key `index`, or `None` past the end.
    pub fn key(&self, index: usize) -> Option<&PublicKey> {
        self.keys.get(index).map(|k| k.private_key.public_key())
    }

    /// Sign `data` with key `index`.
    pub fn sign(&self, index: usize, data: &[u8]) -> Result<Signature, KeyError> {
        let entry = self.keys.get(index).ok_or(KeyError::IndexOutOfRange {
            index,
            len: self.keys.len(),
        })?;
        entry
            .private_key
            .try_sign(data)
            .map_err(|source| KeyError::Sign { index, source })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedKey> {
        self.keys.iter()
    }

    /// Source files of the loaded keys, in load order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.keys.iter().map(|k| k.path.as_path())
    }
}

//! # Node Identity
//!
//! An ed25519 key stored as JSON. The node id is the first 20 bytes of
//! SHA-256 over the public key.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use seed_pex::domain::NODE_ID_LEN;
use seed_pex::NodeId;

/// Node key errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to access key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("key file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

#[derive(Serialize, Deserialize)]
struct NodeKeyFile {
    /// Hex encoded 32-byte ed25519 secret.
    priv_key: String,
}

/// The node's long-lived key.
pub struct NodeKey {
    signing_key: SigningKey,
}

impl NodeKey {
    /// Fresh random key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Key from a 32-byte secret.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Identity derived from the public key.
    pub fn node_id(&self) -> NodeId {
        let digest = Sha256::digest(self.signing_key.verifying_key().as_bytes());
        let mut id = [0u8; NODE_ID_LEN];
        id.copy_from_slice(&digest[..NODE_ID_LEN]);
        NodeId::new(id)
    }

    /// Hex encoded public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        let raw = fs::read_to_string(path).map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: NodeKeyFile = serde_json::from_str(&raw)?;
        let bytes = hex::decode(file.priv_key.trim())
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| IdentityError::InvalidKey(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self::from_seed(seed))
    }

    pub fn save(&self, path: &Path) -> Result<(), IdentityError> {
        let file = NodeKeyFile {
            priv_key: hex::encode(self.signing_key.to_bytes()),
        };
        let raw = serde_json::to_string_pretty(&file)?;
        let io_err = |source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, raw).map_err(io_err)
    }

    /// Load the key at `path`, generating and saving one if none exists.
    pub fn load_or_generate(path: &Path) -> Result<Self, IdentityError> {
        if path.exists() {
            return Self::load(path);
        }
        let key = Self::generate();
        key.save(path)?;
        info!(path = %path.display(), node_id = %key.node_id(), "Generated new node key");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_stable_for_a_seed() {
        let a = NodeKey::from_seed([7u8; 32]);
        let b = NodeKey::from_seed([7u8; 32]);
        let c = NodeKey::from_seed([8u8; 32]);

        assert_eq!(a.node_id(), b.node_id());
        assert_ne!(a.node_id(), c.node_id());
        assert_eq!(a.node_id().to_string().len(), 40);
    }

    #[test]
    fn test_generated_key_is_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("node_key.json");

        let first = NodeKey::load_or_generate(&path).unwrap();
        let second = NodeKey::load_or_generate(&path).unwrap();

        assert!(path.exists());
        assert_eq!(first.node_id(), second.node_id());
        assert_eq!(first.public_key_hex(), second.public_key_hex());
    }

    #[test]
    fn test_short_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_key.json");
        fs::write(&path, r#"{"priv_key":"abcd"}"#).unwrap();

        assert!(matches!(
            NodeKey::load(&path),
            Err(IdentityError::InvalidKey(_))
        ));
    }
}

use std::fs;
use std::path::Path;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{SortitionError, SortitionResult};

/// Length of a compressed secp256k1 public key.
pub const PUBKEY_LEN: usize = 33;

/// Local secp256k1 signing key used to evaluate the VRF.
#[derive(Clone)]
pub struct SigningKey {
    secret: NonZeroScalar,
}

impl SigningKey {
    pub fn from_bytes(bytes: &[u8]) -> SortitionResult<Self> {
        let repr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SortitionError::Crypto("secret key must be 32 bytes".into()))?;
        let secret: Option<NonZeroScalar> = NonZeroScalar::from_repr(repr.into()).into();
        secret
            .map(|secret| Self { secret })
            .ok_or_else(|| SortitionError::Crypto("secret key outside the curve order".into()))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }

    pub(crate) fn scalar(&self) -> Scalar {
        *self.secret.as_ref()
    }

    /// Compressed SEC1 encoding of the matching public key.
    pub fn public_bytes(&self) -> [u8; PUBKEY_LEN] {
        let point = (ProjectivePoint::GENERATOR * self.scalar()).to_affine();
        let encoded = point.to_encoded_point(true);
        let mut bytes = [0u8; PUBKEY_LEN];
        bytes.copy_from_slice(encoded.as_bytes());
        bytes
    }

    pub fn address(&self) -> String {
        address_from_public_key(&self.public_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeypair {
    pub public_key: String,
    pub secret_key: String,
}

pub fn generate_keypair() -> SigningKey {
    SigningKey {
        secret: NonZeroScalar::random(&mut OsRng),
    }
}

pub fn load_or_generate_keypair(path: &Path) -> SortitionResult<SigningKey> {
    if path.exists() {
        load_keypair(path)
    } else {
        let key = generate_keypair();
        save_keypair(path, &key)?;
        Ok(key)
    }
}

pub fn save_keypair(path: &Path, key: &SigningKey) -> SortitionResult<()> {
    let stored = StoredKeypair {
        public_key: hex::encode(key.public_bytes()),
        secret_key: hex::encode(key.to_bytes()),
    };
    let encoded = toml::to_string_pretty(&stored)
        .map_err(|err| SortitionError::Config(format!("failed to encode keypair: {err}")))?;
    fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
    fs::write(path, encoded)?;
    Ok(())
}

pub fn load_keypair(path: &Path) -> SortitionResult<SigningKey> {
    let raw = fs::read_to_string(path)?;
    let stored: StoredKeypair = toml::from_str(&raw)
        .map_err(|err| SortitionError::Config(format!("failed to decode keypair: {err}")))?;
    let secret_bytes = hex::decode(stored.secret_key)
        .map_err(|err| SortitionError::Config(format!("invalid secret key encoding: {err}")))?;
    SigningKey::from_bytes(&secret_bytes)
}

/// Address of a participant: hex of the double-SHA256 of the compressed
/// public key. Deposit state is keyed by this string.
pub fn address_from_public_key(public_key: &[u8]) -> String {
    hex::encode(sha256d(public_key))
}

/// Double SHA-256, the hash used for sort hashes and addresses.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

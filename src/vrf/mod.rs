//! Verifiable random function over secp256k1.
//!
//! The construction follows the discrete-log VRF used across the ecosystem:
//! the input is mapped onto the curve by try-and-increment over SHA-512, the
//! prover publishes `gamma = x·H` together with a Chaum-Pedersen style proof
//! that `gamma` and the public key share the same discrete logarithm, and the
//! VRF output is `SHA256(gamma)`. Verification recomputes the challenge from
//! the transcript and must reproduce the published output byte-for-byte.
//!
//! Proof layout: `s(32) || t(32) || gamma(65, uncompressed SEC1)`.

use k256::elliptic_curve::ff::PrimeField;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use num_bigint::BigUint;
use num_traits::One;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::crypto::SigningKey;

/// Domain separator mixed into the deterministic proof nonce.
const NONCE_DOMAIN: &[u8] = b"sortition.vrf.nonce";

/// Length of a serialized proof: two scalars plus an uncompressed point.
pub const PROOF_LEN: usize = 32 + 32 + 65;

/// Length of the VRF output hash.
pub const HASH_LEN: usize = 32;

/// secp256k1 group order, big-endian.
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
    0x41, 0x41,
];

/// Attempts before giving up on mapping an input onto the curve. Each try
/// succeeds with probability ~1/2, so exhaustion is unreachable in practice.
const HASH_TO_CURVE_ATTEMPTS: u32 = 100;

/// Errors emitted by the VRF module.
#[derive(Debug, Error)]
pub enum VrfError {
    #[error("invalid VRF public key encoding")]
    BadPubkey,
    #[error("invalid VRF proof")]
    BadProof,
    #[error("VRF hash does not match proof")]
    HashMismatch,
    #[error("unable to map input onto the curve")]
    PointMapping,
}

/// Result alias used throughout the VRF module.
pub type VrfResult<T> = Result<T, VrfError>;

/// Evaluates the VRF under `secret` at `alpha`.
///
/// Returns the 32-byte output hash and the serialized proof. The proof nonce
/// is derived from the secret scalar and the input, so the whole result is a
/// pure function of `(secret, alpha)` and repeated evaluation yields
/// byte-identical proofs.
pub fn evaluate(secret: &SigningKey, alpha: &[u8]) -> VrfResult<([u8; HASH_LEN], Vec<u8>)> {
    let x = secret.scalar();
    let h = hash_to_curve(alpha)?;

    let gamma = (ProjectivePoint::from(h) * x).to_affine();
    let gamma_encoded = gamma.to_encoded_point(false);

    let r = proof_nonce(&x, alpha);
    let r_g = (ProjectivePoint::GENERATOR * r).to_affine();
    let r_h = (ProjectivePoint::from(h) * r).to_affine();
    let public = (ProjectivePoint::GENERATOR * x).to_affine();

    let s = challenge(&h, &public, &gamma, &r_g, &r_h);
    let t = r - s * x;

    let mut proof = Vec::with_capacity(PROOF_LEN);
    proof.extend_from_slice(s.to_bytes().as_slice());
    proof.extend_from_slice(t.to_bytes().as_slice());
    proof.extend_from_slice(gamma_encoded.as_bytes());

    Ok((output_hash(gamma_encoded.as_bytes()), proof))
}

/// Checks `proof` against `alpha` under `public` (SEC1 bytes, compressed or
/// uncompressed) and returns the VRF output hash it commits to.
pub fn proof_to_hash(public: &[u8], alpha: &[u8], proof: &[u8]) -> VrfResult<[u8; HASH_LEN]> {
    if proof.len() != PROOF_LEN {
        return Err(VrfError::BadProof);
    }
    let pk = decode_point(public).ok_or(VrfError::BadPubkey)?;
    let s = decode_scalar(&proof[..32]).ok_or(VrfError::BadProof)?;
    let t = decode_scalar(&proof[32..64]).ok_or(VrfError::BadProof)?;
    let gamma = decode_point(&proof[64..]).ok_or(VrfError::BadProof)?;

    let h = hash_to_curve(alpha)?;

    // With an honest proof t = r - s·x, so both sums collapse to the prover's
    // nonce commitments: t·G + s·PK = r·G and t·H + s·gamma = r·H.
    let u = (ProjectivePoint::GENERATOR * t + ProjectivePoint::from(pk) * s).to_affine();
    let v = (ProjectivePoint::from(h) * t + ProjectivePoint::from(gamma) * s).to_affine();

    let expected = challenge(&h, &pk, &gamma, &u, &v);
    if expected.to_bytes().as_slice().ct_eq(s.to_bytes().as_slice()).unwrap_u8() == 0 {
        return Err(VrfError::BadProof);
    }

    Ok(output_hash(gamma.to_encoded_point(false).as_bytes()))
}

/// Verifies that `proof` on `alpha` under `public` reproduces `expected_hash`.
pub fn verify(
    public: &[u8],
    alpha: &[u8],
    proof: &[u8],
    expected_hash: &[u8],
) -> VrfResult<()> {
    let hash = proof_to_hash(public, alpha, proof)?;
    if hash[..] != expected_hash[..] {
        return Err(VrfError::HashMismatch);
    }
    Ok(())
}

fn output_hash(gamma_encoded: &[u8]) -> [u8; HASH_LEN] {
    Sha256::digest(gamma_encoded).into()
}

/// Maps `alpha` onto a curve point: SHA-512 over a big-endian attempt counter
/// and the input, interpreted as the x coordinate of a compressed point with
/// even y. Roughly half of all candidates decode, so a handful of attempts
/// suffice.
fn hash_to_curve(alpha: &[u8]) -> VrfResult<AffinePoint> {
    for attempt in 0..HASH_TO_CURVE_ATTEMPTS {
        let mut hasher = Sha512::new();
        hasher.update(attempt.to_be_bytes());
        hasher.update(alpha);
        let digest = hasher.finalize();

        let mut candidate = [0u8; 33];
        candidate[0] = 0x02;
        candidate[1..].copy_from_slice(&digest[..32]);
        if let Some(point) = decode_point(&candidate) {
            return Ok(point);
        }
    }
    Err(VrfError::PointMapping)
}

/// Hashes `message` to a scalar in `[1, n-1]` using the simple-discard
/// method: SHA-512 over a big-endian rejection counter and the message,
/// truncated to 32 bytes and retried until the value lands below `n - 1`.
fn hash_to_scalar(message: &[u8]) -> Scalar {
    let bound = BigUint::from_bytes_be(&CURVE_ORDER) - BigUint::one();
    let mut attempt: u32 = 0;
    loop {
        let mut hasher = Sha512::new();
        hasher.update(attempt.to_be_bytes());
        hasher.update(message);
        let digest = hasher.finalize();

        let value = BigUint::from_bytes_be(&digest[..32]);
        if value < bound {
            let raw = (value + 1u32).to_bytes_be();
            let mut buf = [0u8; 32];
            buf[32 - raw.len()..].copy_from_slice(&raw);
            if let Some(scalar) = Scalar::from_repr(buf.into()).into() {
                return scalar;
            }
        }
        attempt += 1;
    }
}

/// Challenge scalar over the transcript `(G, H, PK, gamma, U, V)`, every
/// point in uncompressed SEC1 form.
fn challenge(
    h: &AffinePoint,
    public: &AffinePoint,
    gamma: &AffinePoint,
    u: &AffinePoint,
    v: &AffinePoint,
) -> Scalar {
    let mut transcript = Vec::with_capacity(65 * 6);
    transcript.extend_from_slice(AffinePoint::GENERATOR.to_encoded_point(false).as_bytes());
    transcript.extend_from_slice(h.to_encoded_point(false).as_bytes());
    transcript.extend_from_slice(public.to_encoded_point(false).as_bytes());
    transcript.extend_from_slice(gamma.to_encoded_point(false).as_bytes());
    transcript.extend_from_slice(u.to_encoded_point(false).as_bytes());
    transcript.extend_from_slice(v.to_encoded_point(false).as_bytes());
    hash_to_scalar(&transcript)
}

/// Deterministic nonce for the proof, domain-separated from the challenge.
fn proof_nonce(secret: &Scalar, alpha: &[u8]) -> Scalar {
    let mut material = Vec::with_capacity(NONCE_DOMAIN.len() + 32 + alpha.len());
    material.extend_from_slice(NONCE_DOMAIN);
    material.extend_from_slice(secret.to_bytes().as_slice());
    material.extend_from_slice(alpha);
    hash_to_scalar(&material)
}

fn decode_point(bytes: &[u8]) -> Option<AffinePoint> {
    let encoded = EncodedPoint::from_bytes(bytes).ok()?;
    let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    point.filter(|p| p != &AffinePoint::IDENTITY)
}

fn decode_scalar(bytes: &[u8]) -> Option<Scalar> {
    let repr: [u8; 32] = bytes.try_into().ok()?;
    Scalar::from_repr(repr.into()).into()
}

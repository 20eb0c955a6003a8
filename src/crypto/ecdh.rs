//! P-256 ECDH for the provisioning key exchange. Backed by `ring`.
use crate::crypto::{ECDHSecret, Secret};
use crate::provisioning::protocol::PublicKey;
use core::convert::TryInto;
use ring::agreement;

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, thiserror::Error)]
pub enum EcdhError {
    #[error("unable to generate a P-256 key pair")]
    KeyGenerationProblem,
    /// The peer's point isn't on the curve (or is the point at infinity).
    #[error("peer public key rejected")]
    InvalidPublicKey,
}

const ELEM_LEN: usize = 32;

pub struct PrivateKey {
    key: agreement::EphemeralPrivateKey,
}
impl PrivateKey {
    /// Generates a fresh ephemeral key pair from the system random source.
    /// # Errors
    /// `KeyGenerationProblem` if the random source fails.
    pub fn new() -> Result<PrivateKey, EcdhError> {
        Ok(PrivateKey {
            key: agreement::EphemeralPrivateKey::generate(
                &agreement::ECDH_P256,
                &ring::rand::SystemRandom::new(),
            )
            .map_err(|_| EcdhError::KeyGenerationProblem)?,
        })
    }
    /// X and Y coordinates of the matching public key.
    /// # Errors
    /// `KeyGenerationProblem` if `ring` can't compute the public point.
    pub fn public_key(&self) -> Result<PublicKey, EcdhError> {
        let public = self
            .key
            .compute_public_key()
            .map_err(|_| EcdhError::KeyGenerationProblem)?;
        // Uncompressed point: 0x04 || X || Y
        let b = &public.as_ref()[1..];
        if b.len() != ELEM_LEN * 2 {
            return Err(EcdhError::KeyGenerationProblem);
        }
        Ok(PublicKey {
            x: b[..ELEM_LEN].try_into().expect("length checked above"),
            y: b[ELEM_LEN..].try_into().expect("length checked above"),
        })
    }
    /// Consumes the private key and computes the shared secret with `public_key`.
    /// # Errors
    /// `InvalidPublicKey` if `public_key` isn't a valid P-256 point.
    pub fn agree(self, public_key: &PublicKey) -> Result<ECDHSecret, EcdhError> {
        let mut p_key = [0_u8; ELEM_LEN * 2 + 1];
        p_key[0] = 0x04;
        p_key[1..=ELEM_LEN].copy_from_slice(&public_key.x);
        p_key[1 + ELEM_LEN..].copy_from_slice(&public_key.y);
        agreement::agree_ephemeral(
            self.key,
            &agreement::UnparsedPublicKey::new(&agreement::ECDH_P256, &p_key[..]),
            |shared| Secret::from_slice(shared),
        )
        .map_err(|_| EcdhError::InvalidPublicKey)?
        .ok_or(EcdhError::InvalidPublicKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agree_both_sides() {
        let a = PrivateKey::new().unwrap();
        let b = PrivateKey::new().unwrap();
        let a_pub = a.public_key().unwrap();
        let b_pub = b.public_key().unwrap();
        assert_eq!(a.agree(&b_pub).unwrap(), b.agree(&a_pub).unwrap());
    }
    #[test]
    fn test_reject_bad_point() {
        let a = PrivateKey::new().unwrap();
        let bad = PublicKey {
            x: [0_u8; 32],
            y: [0_u8; 32],
        };
        assert_eq!(a.agree(&bad).unwrap_err(), EcdhError::InvalidPublicKey);
    }
}

//! Mesh key derivation functions (`s1`, `k1`-`k4`). All of them are built out of AES-CMAC.
use crate::crypto::aes::AESCipher;
use crate::crypto::key::{AppKey, EncryptionKey, Key, PrivacyKey, ZERO_KEY};
use crate::crypto::{Salt, AID};
use crate::mesh::NID;

/// k1 function from Mesh Core v1.0. `T = CMAC_salt(N)`, `k1 = CMAC_T(P)`.
/// `n` can be any length (the provisioning ECDH secret is 32 bytes).
#[must_use]
pub fn k1(n: &[u8], salt: Salt, p: &[u8]) -> Key {
    let t = AESCipher::new(salt.as_key()).cmac(n);
    AESCipher::new(t).cmac(p)
}
/// k2 network key material derivation. Returns `(NID, EncryptionKey, PrivacyKey)`.
/// # Panics
/// Panics if `p` is empty.
#[must_use]
pub fn k2(n: &Key, p: &[u8]) -> (NID, EncryptionKey, PrivacyKey) {
    assert!(!p.is_empty(), "p must have at least one byte");
    let salt = s1(b"smk2");
    let t = AESCipher::new(salt.as_key()).cmac(n.as_ref());
    let cipher = AESCipher::new(t);
    let t_1 = cipher.cmac_slice(&[p, &[0x01]]);
    let t_2 = cipher.cmac_slice(&[t_1.as_ref(), p, &[0x02]]);
    let t_3 = cipher.cmac_slice(&[t_2.as_ref(), p, &[0x03]]);

    (
        NID::new(t_1.as_ref()[15] & 0x7F),
        EncryptionKey::new(t_2),
        PrivacyKey::new(t_3),
    )
}
/// k3 derives the 64-bit Network ID.
#[must_use]
pub fn k3(n: &Key) -> u64 {
    let salt = s1(b"smk3");
    let t = AESCipher::new(salt.as_key()).cmac(n.as_ref());
    let mut last = [0_u8; 8];
    last.copy_from_slice(&AESCipher::new(t).cmac(b"id64\x01").as_ref()[8..]);
    u64::from_be_bytes(last)
}
/// k4 derives the 6-bit `AID` of an application key.
#[must_use]
pub fn k4(n: &AppKey) -> AID {
    let salt = s1(b"smk4");
    let t = AESCipher::new(salt.as_key()).cmac(n.key().as_ref());
    AID::new_masked(AESCipher::new(t).cmac(b"id6\x01").as_ref()[15])
}
/// s1 SALT generation function. AES-CMAC with the zero key.
#[must_use]
pub fn s1(m: &[u8]) -> Salt {
    AESCipher::new(ZERO_KEY).cmac(m).as_salt()
}

/// Tests based on Mesh Core v1.0 Sample Data.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hex_16_to_array;

    fn sample_net_key() -> Key {
        Key::from_hex("f7a2a44f8e8a8029064f173ddc1e2b00").unwrap()
    }

    #[test]
    fn test_s1() {
        assert_eq!(
            s1(b"test"),
            Salt::from_hex("b73cefbd641ef2ea598c2b6efb62f79c").unwrap()
        );
    }
    #[test]
    fn test_k1() {
        let n = hex_16_to_array("3216d1509884b533248541792b877f98").unwrap();
        let salt = Salt::from_hex("2ba14ffa0df84a2831938d57d276cab4").unwrap();
        let p = hex_16_to_array("5a09d60797eeb4478aada59db3352a0d").unwrap();
        let expected = Key::from_hex("f6ed15a8934afbe7d83e8dcb57fcf5d7").unwrap();
        assert_eq!(k1(&n, salt, &p), expected);
    }

    #[test]
    fn test_k2_master() {
        let nid = NID::new(0x7F);
        let encryption_key = EncryptionKey::from_hex("9f589181a0f50de73c8070c7a6d27f46").unwrap();
        let privacy_key = PrivacyKey::from_hex("4c715bd4a64b938f99b453351653124f").unwrap();
        assert_eq!(
            k2(&sample_net_key(), &[0x00]),
            (nid, encryption_key, privacy_key)
        );
    }
    #[test]
    fn test_k2_friendship() {
        let nid = NID::new(0x73);
        let encryption_key = EncryptionKey::from_hex("11efec0642774992510fb5929646df49").unwrap();
        let privacy_key = PrivacyKey::from_hex("d4d7cc0dfa772d836a8df9df5510d7a7").unwrap();
        assert_eq!(
            k2(
                &sample_net_key(),
                &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09]
            ),
            (nid, encryption_key, privacy_key)
        );
    }
    #[test]
    fn test_k3() {
        assert_eq!(0xff04_6958_233d_b014_u64, k3(&sample_net_key()));
    }
    #[test]
    fn test_k4() {
        let app_key = AppKey::from_hex("3216d1509884b533248541792b877f98").unwrap();
        assert_eq!(AID::new(0x38), k4(&app_key))
    }
}

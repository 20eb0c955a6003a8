//! Fixed size secret byte strings. Wiped on drop, compared in constant time and never printed.
use crate::random;
use core::fmt::{Debug, Formatter};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone)]
pub struct Secret<const N: usize>([u8; N]);

impl<const N: usize> Secret<N> {
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        Secret(bytes)
    }
    /// Fills a new secret from the OS random source.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0_u8; N];
        random::secure_random_fill_bytes(&mut bytes);
        Secret(bytes)
    }
    /// Copies `bytes` into a new secret. `None` if the length doesn't match.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() == N {
            let mut out = [0_u8; N];
            out.copy_from_slice(bytes);
            Some(Secret(out))
        } else {
            None
        }
    }
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.0
    }
    /// Constant time comparison. Different lengths compare unequal.
    #[must_use]
    pub fn ct_eq(&self, other: &[u8]) -> bool {
        self.0[..].ct_eq(other).into()
    }
}
impl<const N: usize> AsRef<[u8]> for Secret<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(&other.0)
    }
}
impl<const N: usize> Eq for Secret<N> {}
impl<const N: usize> Debug for Secret<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "Secret<{}>(..)", N)
    }
}
impl<const N: usize> Drop for Secret<N> {
    fn drop(&mut self) {
        self.0.zeroize()
    }
}
impl<const N: usize> ZeroizeOnDrop for Secret<N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq() {
        let s = Secret::new([1_u8, 2, 3, 4]);
        assert!(s.ct_eq(&[1, 2, 3, 4]));
        assert!(!s.ct_eq(&[1, 2, 3, 5]));
        assert!(!s.ct_eq(&[1, 2, 3]));
        assert_eq!(s, Secret::new([1, 2, 3, 4]));
    }
    #[test]
    fn test_debug_redacted() {
        let s = Secret::new([0xAA_u8; 16]);
        assert_eq!(format!("{:?}", s), "Secret<16>(..)");
        assert!(Secret::<4>::from_slice(&[1, 2]).is_none());
    }
}

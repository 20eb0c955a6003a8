// Generalized over the rand Library so there's no hard dependencies.
use rand::{Rng, RngCore};

/// Fills `buf` from the OS random source. Used for anything secret (provisioning randoms, OOB
/// values, keys).
pub fn secure_random_fill_bytes(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf)
}

#[must_use]
pub fn secure_16_bytes() -> [u8; 16] {
    let mut out = [0_u8; 16];
    secure_random_fill_bytes(&mut out);
    out
}

/// Uniform random value in `0..upper`.
#[must_use]
pub fn secure_below(upper: u32) -> u32 {
    rand::rngs::OsRng.gen_range(0..upper)
}

#[must_use]
pub fn rand_u8() -> u8 {
    rand::random()
}

pub trait Randomizable: Sized {
    #[must_use]
    fn random_secure() -> Self;
}

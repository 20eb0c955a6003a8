pub mod access;
pub mod crypto;

//! Provisioning Layer for Bluetooth Mesh
//! Provisioning is Big Endian.
//!
//! [`provisioner::Provisioner`] runs the handshake, [`protocol`] holds the PDUs,
//! [`confirmation`] and [`data`] the handshake crypto.

pub mod confirmation;
pub mod data;
pub mod protocol;
pub mod provisioner;

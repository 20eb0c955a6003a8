//! Collection of security materials (Keys, NID, AID, etc) used for encryption and decryption.
use crate::crypto::key::{AppKey, EncryptionKey, NetKey, PrivacyKey};
use crate::crypto::{NetworkID, AID};
use crate::mesh::{AppKeyIndex, NetKeyIndex, NID};
use crate::provisioning::data::Flags;
use std::collections::btree_map;

#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct NetworkKeys {
    nid: NID,
    encryption: EncryptionKey,
    privacy: PrivacyKey,
}

impl NetworkKeys {
    #[must_use]
    pub const fn new(nid: NID, encryption: EncryptionKey, privacy: PrivacyKey) -> Self {
        Self {
            nid,
            encryption,
            privacy,
        }
    }
    #[must_use]
    pub const fn nid(&self) -> NID {
        self.nid
    }
    #[must_use]
    pub const fn encryption_key(&self) -> &EncryptionKey {
        &self.encryption
    }
    #[must_use]
    pub const fn privacy_key(&self) -> &PrivacyKey {
        &self.privacy
    }
}
impl From<&NetKey> for NetworkKeys {
    fn from(k: &NetKey) -> Self {
        let (nid, encryption, privacy) = k.derive_master_credentials();
        Self::new(nid, encryption, privacy)
    }
}
/// Everything a node needs to join one subnet. Handed to the device in the Provisioning Data.
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct NetworkCredentials {
    net_key: NetKey,
    index: NetKeyIndex,
    flags: Flags,
    network_keys: NetworkKeys,
    network_id: NetworkID,
}
impl NetworkCredentials {
    #[must_use]
    pub fn new(net_key: NetKey, index: NetKeyIndex, flags: Flags) -> Self {
        Self {
            net_key,
            index,
            flags,
            network_keys: (&net_key).into(),
            network_id: (&net_key).into(),
        }
    }
    #[must_use]
    pub const fn net_key(&self) -> &NetKey {
        &self.net_key
    }
    #[must_use]
    pub const fn index(&self) -> NetKeyIndex {
        self.index
    }
    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }
    #[must_use]
    pub const fn network_keys(&self) -> &NetworkKeys {
        &self.network_keys
    }
    #[must_use]
    pub const fn network_id(&self) -> NetworkID {
        self.network_id
    }
}
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct ApplicationSecurityMaterials {
    pub app_key: AppKey,
    pub aid: AID,
    pub net_key_index: NetKeyIndex,
}
impl ApplicationSecurityMaterials {
    #[must_use]
    pub fn new(app_key: AppKey, net_key_index: NetKeyIndex) -> Self {
        Self {
            app_key,
            aid: app_key.aid(),
            net_key_index,
        }
    }
}
#[derive(Default, Clone, Debug)]
pub struct AppKeyMap {
    map: btree_map::BTreeMap<AppKeyIndex, ApplicationSecurityMaterials>,
}
impl AppKeyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(
        &mut self,
        index: AppKeyIndex,
        materials: ApplicationSecurityMaterials,
    ) -> Option<ApplicationSecurityMaterials> {
        self.map.insert(index, materials)
    }
    #[must_use]
    pub fn get_key(&self, index: AppKeyIndex) -> Option<&ApplicationSecurityMaterials> {
        self.map.get(&index)
    }
    pub fn remove_key(&mut self, index: AppKeyIndex) -> Option<ApplicationSecurityMaterials> {
        self.map.remove(&index)
    }
    /// Every application key with `aid`. `AID` is only 6 bits so more than one key can match and
    /// only trying to decrypt tells them apart.
    pub fn matching_aid(
        &self,
        aid: AID,
    ) -> impl Iterator<Item = (AppKeyIndex, &'_ ApplicationSecurityMaterials)> {
        self.map
            .iter()
            .filter(move |(_, sm)| sm.aid == aid)
            .map(|(&index, sm)| (index, sm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::KeyIndex;

    #[test]
    fn test_network_keys_from_net_key() {
        let net_key = NetKey::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap();
        let keys = NetworkKeys::from(&net_key);
        assert_eq!(keys.nid(), NID::new(0x68));
        assert_eq!(
            keys.encryption_key(),
            &EncryptionKey::from_hex("0953fa93e7caac9638f58820220a398e").unwrap()
        );
        assert_eq!(
            keys.privacy_key(),
            &PrivacyKey::from_hex("8b84eedec100067d670971dd2aa700cf").unwrap()
        );
    }
    #[test]
    fn test_matching_aid() {
        let mut map = AppKeyMap::new();
        let app_key = AppKey::from_hex("3216d1509884b533248541792b877f98").unwrap();
        let index = AppKeyIndex(KeyIndex::new(1));
        map.insert(
            index,
            ApplicationSecurityMaterials::new(app_key, NetKeyIndex::default()),
        );
        assert_eq!(map.matching_aid(AID::new(0x38)).count(), 1);
        assert_eq!(map.matching_aid(AID::new(0x01)).count(), 0);
        assert!(map.get_key(index).is_some());
    }
}

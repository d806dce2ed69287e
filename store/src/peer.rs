//! The peers table: endpoint → last contact time.
//!
//! Persisted so a restarting node can re-dial recently seen peers instead of
//! depending entirely on preconfigured ones.

use std::net::SocketAddrV6;

use crate::{ReadTxn, StoreError, Table, WriteTxn};

fn endpoint_key(endpoint: &SocketAddrV6) -> [u8; 18] {
    let mut key = [0u8; 18];
    key[..16].copy_from_slice(&endpoint.ip().octets());
    key[16..].copy_from_slice(&endpoint.port().to_le_bytes());
    key
}

fn endpoint_from_key(key: &[u8]) -> Option<SocketAddrV6> {
    if key.len() != 18 {
        return None;
    }
    let octets: [u8; 16] = key[..16].try_into().ok()?;
    let port = u16::from_le_bytes([key[16], key[17]]);
    Some(SocketAddrV6::new(octets.into(), port, 0, 0))
}

/// Typed view over the peers table.
pub struct PeerTable;

impl PeerTable {
    pub fn put(
        txn: &mut dyn WriteTxn,
        endpoint: &SocketAddrV6,
        last_contact: u64,
    ) -> Result<(), StoreError> {
        txn.put(
            Table::Peers,
            &endpoint_key(endpoint),
            &last_contact.to_le_bytes(),
        )
    }

    pub fn del(txn: &mut dyn WriteTxn, endpoint: &SocketAddrV6) -> Result<(), StoreError> {
        txn.delete(Table::Peers, &endpoint_key(endpoint))
    }

    pub fn iter(txn: &dyn ReadTxn) -> Result<Vec<(SocketAddrV6, u64)>, StoreError> {
        txn.iter(Table::Peers)?
            .into_iter()
            .map(|(key, value)| {
                let endpoint = endpoint_from_key(&key)
                    .ok_or_else(|| StoreError::Backend("malformed peer key".into()))?;
                let bytes: [u8; 8] = value
                    .try_into()
                    .map_err(|_| StoreError::Backend("malformed peer value".into()))?;
                Ok((endpoint, u64::from_le_bytes(bytes)))
            })
            .collect()
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        txn.count(Table::Peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemStore, Store};
    use std::net::Ipv6Addr;

    #[test]
    fn put_iter_round_trip() {
        let store = MemStore::new();
        let endpoint = SocketAddrV6::new(Ipv6Addr::LOCALHOST, 7075, 0, 0);
        let mut txn = store.tx_begin_write().unwrap();
        PeerTable::put(txn.as_mut(), &endpoint, 123456).unwrap();

        let peers = PeerTable::iter(txn.as_read()).unwrap();
        assert_eq!(peers, vec![(endpoint, 123456)]);

        PeerTable::del(txn.as_mut(), &endpoint).unwrap();
        assert_eq!(PeerTable::count(txn.as_read()).unwrap(), 0);
    }
}

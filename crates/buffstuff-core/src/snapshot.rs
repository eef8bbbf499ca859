//! Binary layout of the inactive-buff snapshot stored in the save game.
//!
//! `[magic "BFST"][major u16 LE][minor u16 LE][bincode payload]`
//!
//! The payload is a map from player uid to that player's records. Version
//! 1.0 records lack the tick counter; they are upgraded on load.

use std::collections::BTreeMap;

use buffstuff_common::{MagicBytes, PlayerUid, SchemaVersion, StoreError, StoreResult};

use crate::record::{SerializedBuff, SerializedBuffV1};

/// Offline player -> serialized buffs, in the order they were captured.
pub type InactiveBuffs = BTreeMap<PlayerUid, Vec<SerializedBuff>>;

const HEADER_LEN: usize = 8;

/// Encodes `buffs` in the current layout.
pub fn encode_snapshot(buffs: &InactiveBuffs) -> StoreResult<Vec<u8>> {
    encode_with_version(buffs, SchemaVersion::SNAPSHOT_CURRENT)
}

fn encode_with_version(buffs: &InactiveBuffs, version: SchemaVersion) -> StoreResult<Vec<u8>> {
    let mut buffer = Vec::with_capacity(HEADER_LEN);
    buffer.extend_from_slice(&MagicBytes::SNAPSHOT.0);
    buffer.extend_from_slice(&version.to_le_bytes());

    let data = if version == SchemaVersion::SNAPSHOT_V1 {
        let legacy: BTreeMap<&PlayerUid, Vec<SerializedBuffV1>> = buffs
            .iter()
            .map(|(uid, records)| {
                let records = records
                    .iter()
                    .map(|r| SerializedBuffV1 {
                        id: r.id.clone(),
                        time_remaining_days: r.time_remaining_days,
                        data: r.data.clone(),
                    })
                    .collect();
                (uid, records)
            })
            .collect();
        bincode::serialize(&legacy)
    } else {
        bincode::serialize(buffs)
    }
    .map_err(|e| StoreError::Serialization(e.to_string()))?;

    buffer.extend(data);
    Ok(buffer)
}

/// Decodes a snapshot written by this or an older compatible build.
pub fn decode_snapshot(bytes: &[u8]) -> StoreResult<InactiveBuffs> {
    if bytes.len() < HEADER_LEN || !MagicBytes::SNAPSHOT.matches(bytes) {
        return Err(StoreError::InvalidFormat);
    }

    let version = SchemaVersion::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if !SchemaVersion::SNAPSHOT_CURRENT.can_read(&version) {
        return Err(StoreError::VersionMismatch {
            expected: SchemaVersion::SNAPSHOT_CURRENT,
            found: version,
        });
    }

    let payload = &bytes[HEADER_LEN..];
    if version.minor < SchemaVersion::SNAPSHOT_V2.minor {
        let legacy: BTreeMap<PlayerUid, Vec<SerializedBuffV1>> =
            bincode::deserialize(payload).map_err(|e| StoreError::Corrupted(e.to_string()))?;
        return Ok(legacy
            .into_iter()
            .map(|(uid, records)| (uid, records.into_iter().map(SerializedBuff::from).collect()))
            .collect());
    }

    bincode::deserialize(payload).map_err(|e| StoreError::Corrupted(e.to_string()))
}

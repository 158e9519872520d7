//! Binary snapshot codec for [`GameState`].
//!
//! A snapshot is a bitcode blob with a versioned header. The blob is opaque;
//! storing it somewhere is the caller's business.

use crate::engine::hash_state;
use crate::fixed::Millis;
use crate::sim::StateHash;
use crate::state::GameState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an emporium snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xE3B0_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("state hash mismatch: header {expected:#018x}, decoded {actual:#018x}")]
    HashMismatch { expected: u64, actual: u64 },
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header stored with every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Simulation time the snapshot was taken at.
    pub now_ms: Millis,
    /// Fingerprint of the encoded state, checked on decode.
    pub state_hash: u64,
}

impl SnapshotHeader {
    pub fn new(now_ms: Millis, state_hash: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            now_ms,
            state_hash,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    header: SnapshotHeader,
    state: GameState,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode a state into a snapshot blob.
pub fn encode(state: &GameState) -> Result<Vec<u8>, SerializeError> {
    let snapshot = Snapshot {
        header: SnapshotHeader::new(state.now_ms, hash_state(state)),
        state: state.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a snapshot blob, checking the header and the state fingerprint.
pub fn decode(data: &[u8]) -> Result<GameState, DeserializeError> {
    let snapshot: Snapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    let actual = hash_state(&snapshot.state);
    if actual != snapshot.header.state_hash {
        return Err(DeserializeError::HashMismatch {
            expected: snapshot.header.state_hash,
            actual,
        });
    }
    Ok(snapshot.state)
}

/// Read only the header of a snapshot blob.
pub fn read_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: Snapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

// ---------------------------------------------------------------------------
// Subsystem hashes
// ---------------------------------------------------------------------------

/// Per-subsystem fingerprints for pinpointing where two sessions diverged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemHashes {
    pub economy: u64,
    pub businesses: u64,
    pub deliveries: u64,
    pub market: u64,
}

pub fn subsystem_hashes(state: &GameState) -> SubsystemHashes {
    let mut economy = StateHash::new();
    economy.write_i64(state.coins);
    economy.write_u64(state.now_ms);
    economy.write_u64(state.tick);

    let mut businesses = StateHash::new();
    for b in &state.businesses {
        businesses.write_u32(b.id.0);
        businesses.write_u32(b.incoming.current);
        businesses.write_u32(b.outgoing.current);
        businesses.write_fixed64(b.progress);
        businesses.write_u32(b.level);
    }

    let mut deliveries = StateHash::new();
    for (_, d) in state.deliveries_in_order() {
        deliveries.write_u64(d.sequence);
        deliveries.write_u32(d.source.0);
        deliveries.write_u32(d.target.0);
        deliveries.write_u32(d.amount);
        deliveries.write_u64(d.expected_arrival_ms);
    }

    let mut market = StateHash::new();
    market.write_u64(state.rng.state());
    for (_, e) in state.market.iter() {
        market.write_fixed64(e.value);
        market.write_fixed64(e.target);
    }

    SubsystemHashes {
        economy: economy.finish(),
        businesses: businesses.finish(),
        deliveries: deliveries.finish(),
        market: market.finish(),
    }
}

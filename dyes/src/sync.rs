//! Dye state sync between connected players. Push is periodic and
//! unconditional so a dropped packet self-corrects within one interval; pull
//! drains opportunistically whenever a remote character's frame update needs
//! fresher data. Peers that leave the session are pruned on the next drain.

use std::collections::{HashMap, HashSet};

use bytemuck::{Pod, Zeroable};

use crate::error::NetError;
use crate::target::{DyeValue, DyeValues};

pub type PeerId = u64;

/// Private reliable channel carrying dye payloads. The payload has no
/// version field; a schema change needs a new channel id so mixed versions
/// never decode each other's data.
pub const DYE_SYNC_CHANNEL: i32 = 100_067;

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct WireDye {
    applied: u32,
    red: f32,
    green: f32,
    blue: f32,
    intensity: f32,
}

/// The fixed 60-byte wire layout: three dye records back to back, little
/// endian, no header.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct WirePayload {
    primary: WireDye,
    secondary: WireDye,
    tertiary: WireDye,
}

pub const WIRE_PAYLOAD_SIZE: usize = std::mem::size_of::<WirePayload>();

impl From<DyeValue> for WireDye {
    fn from(value: DyeValue) -> Self {
        WireDye {
            applied: value.is_applied as u32,
            red: value.red,
            green: value.green,
            blue: value.blue,
            intensity: value.intensity,
        }
    }
}

impl From<WireDye> for DyeValue {
    fn from(wire: WireDye) -> Self {
        DyeValue {
            is_applied: wire.applied != 0,
            red: wire.red,
            green: wire.green,
            blue: wire.blue,
            intensity: wire.intensity,
        }
    }
}

pub fn encode(values: &DyeValues) -> [u8; WIRE_PAYLOAD_SIZE] {
    let payload = WirePayload {
        primary: values.primary.into(),
        secondary: values.secondary.into(),
        tertiary: values.tertiary.into(),
    };
    let mut bytes = [0u8; WIRE_PAYLOAD_SIZE];
    bytes.copy_from_slice(bytemuck::bytes_of(&payload));
    bytes
}

/// Decode a datagram, rejecting anything that isn't exactly one payload.
/// Read unaligned; the bytes come straight out of a receive buffer.
pub fn decode(bytes: &[u8]) -> Option<DyeValues> {
    if bytes.len() != WIRE_PAYLOAD_SIZE {
        return None;
    }
    let payload: WirePayload = bytemuck::pod_read_unaligned(bytes);
    Some(DyeValues {
        primary: payload.primary.into(),
        secondary: payload.secondary.into(),
        tertiary: payload.tertiary.into(),
    })
}

/// The messaging surface the agent provides over the platform's peer-to-peer
/// channel plus the host's session roster.
pub trait PeerTransport {
    /// The local player's own id, excluded from broadcasts.
    fn local_peer(&self) -> Option<PeerId>;
    /// Everyone in the current session, including the local player.
    fn roster(&self) -> Vec<PeerId>;
    fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), NetError>;
    /// All datagrams that arrived since the last drain.
    fn drain(&mut self) -> Vec<(PeerId, Vec<u8>)>;
}

/// Send the local player's resolved dyes to every other connected player.
/// Failures are logged and dropped; the next interval resends current state
/// anyway.
pub fn broadcast(transport: &mut impl PeerTransport, values: &DyeValues) {
    let local = transport.local_peer();
    let bytes = encode(values);
    for peer in transport.roster() {
        if Some(peer) == local {
            continue;
        }
        if let Err(error) = transport.send(peer, &bytes) {
            tracing::error!("Failed sending dye state to peer {peer}: {error}");
        }
    }
}

/// Last-received dye values per connected peer. Last write wins; entries
/// disappear once the peer leaves the roster.
#[derive(Debug, Default)]
pub struct PeerCache {
    entries: HashMap<PeerId, DyeValues>,
}

impl PeerCache {
    /// Drain pending messages into the cache, then drop entries for peers no
    /// longer in the session.
    pub fn receive(&mut self, transport: &mut impl PeerTransport) {
        for (peer, bytes) in transport.drain() {
            match decode(&bytes) {
                Some(values) => {
                    if !self.entries.contains_key(&peer) {
                        tracing::debug!("Received first dye values from peer {peer}");
                    }
                    self.entries.insert(peer, values);
                }
                None => {
                    tracing::warn!(
                        "Dropping malformed dye payload from peer {peer} ({} bytes)",
                        bytes.len()
                    );
                }
            }
        }

        let roster: HashSet<PeerId> = transport.roster().into_iter().collect();
        self.entries.retain(|peer, _| {
            let connected = roster.contains(peer);
            if !connected {
                tracing::debug!("Dropping dye values for disconnected peer {peer}");
            }
            connected
        });
    }

    /// The last dyes a peer sent, or nothing applied if we never heard from
    /// them.
    pub fn get(&self, peer: PeerId) -> DyeValues {
        self.entries.get(&peer).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeTransport {
        local: Option<PeerId>,
        roster: Vec<PeerId>,
        inbox: Vec<(PeerId, Vec<u8>)>,
        sent: Vec<(PeerId, Vec<u8>)>,
        fail_sends: bool,
    }

    impl PeerTransport for FakeTransport {
        fn local_peer(&self) -> Option<PeerId> {
            self.local
        }
        fn roster(&self) -> Vec<PeerId> {
            self.roster.clone()
        }
        fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), NetError> {
            if self.fail_sends {
                return Err(NetError::SendFailed(peer, -1));
            }
            self.sent.push((peer, payload.to_vec()));
            Ok(())
        }
        fn drain(&mut self) -> Vec<(PeerId, Vec<u8>)> {
            std::mem::take(&mut self.inbox)
        }
    }

    fn red_primary() -> DyeValues {
        let mut values = DyeValues::default();
        values.primary.is_applied = true;
        values.primary.red = 1.0;
        values.primary.intensity = 2.0;
        values
    }

    #[test]
    fn payload_is_sixty_bytes_and_round_trips() {
        assert_eq!(WIRE_PAYLOAD_SIZE, 60);
        let values = red_primary();
        assert_eq!(decode(&encode(&values)), Some(values));
    }

    #[test]
    fn short_datagrams_are_rejected() {
        assert!(decode(&[0u8; 12]).is_none());
        assert!(decode(&[0u8; 61]).is_none());
        assert!(decode(&[]).is_none());
    }

    #[test]
    fn broadcast_skips_the_local_peer() {
        let mut transport = FakeTransport {
            local: Some(1),
            roster: vec![1, 2, 3],
            ..Default::default()
        };
        broadcast(&mut transport, &red_primary());

        let recipients: Vec<PeerId> = transport.sent.iter().map(|(peer, _)| *peer).collect();
        assert_eq!(recipients, vec![2, 3]);
        assert!(transport.sent.iter().all(|(_, b)| b.len() == WIRE_PAYLOAD_SIZE));
    }

    #[test]
    fn send_failures_do_not_panic_or_retry() {
        let mut transport = FakeTransport {
            local: Some(1),
            roster: vec![1, 2],
            fail_sends: true,
            ..Default::default()
        };
        broadcast(&mut transport, &red_primary());
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn cache_keeps_the_last_write_per_peer() {
        let mut cache = PeerCache::default();
        let mut transport = FakeTransport {
            roster: vec![7],
            ..Default::default()
        };

        let mut first = red_primary();
        transport.inbox.push((7, encode(&first).to_vec()));
        cache.receive(&mut transport);
        assert_eq!(cache.get(7), first);

        first.primary.blue = 1.0;
        transport.inbox.push((7, encode(&first).to_vec()));
        cache.receive(&mut transport);
        assert_eq!(cache.get(7), first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn disconnected_peers_are_evicted() {
        let mut cache = PeerCache::default();
        let mut transport = FakeTransport {
            roster: vec![7, 8],
            ..Default::default()
        };
        transport.inbox.push((7, encode(&red_primary()).to_vec()));
        cache.receive(&mut transport);
        assert_eq!(cache.len(), 1);

        // Peer 7 leaves the session; the next drain prunes it.
        transport.roster = vec![8];
        cache.receive(&mut transport);
        assert!(cache.is_empty());
        assert_eq!(cache.get(7), DyeValues::default());
    }

    #[test]
    fn malformed_payloads_do_not_create_entries() {
        let mut cache = PeerCache::default();
        let mut transport = FakeTransport {
            roster: vec![9],
            ..Default::default()
        };
        transport.inbox.push((9, vec![1, 2, 3]));
        cache.receive(&mut transport);
        assert!(cache.is_empty());
    }
}

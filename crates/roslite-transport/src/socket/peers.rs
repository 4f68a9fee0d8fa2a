//! Connected peers of one bound socket.

use tokio::sync::mpsc;

use crate::message::Message;
use crate::poller::PeerId;

/// Outbound queues of every connected peer, in connection order.
#[derive(Debug, Default)]
pub(crate) struct PeerTable {
    peers: Vec<(PeerId, mpsc::Sender<Message>)>,
    /// Next peer to try for round-robin delivery
    cursor: usize,
}

impl PeerTable {
    pub(crate) fn insert(&mut self, peer: PeerId, outbound: mpsc::Sender<Message>) {
        self.peers.push((peer, outbound));
    }

    pub(crate) fn remove(&mut self, peer: PeerId) -> bool {
        let Some(index) = self.peers.iter().position(|(id, _)| *id == peer) else {
            return false;
        };
        self.peers.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.peers.len() {
            self.cursor = 0;
        }
        true
    }

    pub(crate) fn get(&self, peer: PeerId) -> Option<&mpsc::Sender<Message>> {
        self.peers
            .iter()
            .find(|(id, _)| *id == peer)
            .map(|(_, outbound)| outbound)
    }

    pub(crate) fn len(&self) -> usize {
        self.peers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &mpsc::Sender<Message>> {
        self.peers.iter().map(|(_, outbound)| outbound)
    }

    /// Peers in round-robin order starting at the cursor.
    pub(crate) fn rotation(&self) -> impl Iterator<Item = (usize, &mpsc::Sender<Message>)> {
        let len = self.peers.len();
        let start = self.cursor;
        (0..len).filter_map(move |step| {
            let index = (start + step) % len;
            self.peers.get(index).map(|(_, outbound)| (index, outbound))
        })
    }

    /// Moves the cursor past the peer at `index`.
    pub(crate) fn advance_past(&mut self, index: usize) {
        if !self.peers.is_empty() {
            self.cursor = (index + 1) % self.peers.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_wraps_from_cursor() {
        let mut table = PeerTable::default();
        for id in 0..3 {
            let (tx, _rx) = mpsc::channel(1);
            table.insert(PeerId(id), tx);
        }
        table.advance_past(1);

        let order: Vec<usize> = table.rotation().map(|(index, _)| index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn test_remove_keeps_cursor_in_range() {
        let mut table = PeerTable::default();
        for id in 0..2 {
            let (tx, _rx) = mpsc::channel(1);
            table.insert(PeerId(id), tx);
        }
        table.advance_past(0);
        assert!(table.remove(PeerId(1)));
        assert!(!table.remove(PeerId(1)));

        let order: Vec<usize> = table.rotation().map(|(index, _)| index).collect();
        assert_eq!(order, vec![0]);
    }
}

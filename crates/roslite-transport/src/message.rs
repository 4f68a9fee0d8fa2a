//! Multipart messages.

use bytes::Bytes;

/// An ordered list of byte frames travelling as one unit.
///
/// Application payloads are single-part. Routing sockets prepend an
/// envelope frame naming the peer a reply has to go back to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    parts: Vec<Bytes>,
}

impl Message {
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }

    /// Creates a single-part message.
    pub fn single(part: impl Into<Bytes>) -> Self {
        Self {
            parts: vec![part.into()],
        }
    }

    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Bytes> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Prepends an envelope frame.
    pub fn push_front(&mut self, part: Bytes) {
        self.parts.insert(0, part);
    }

    /// Removes and returns the first frame.
    pub fn pop_front(&mut self) -> Option<Bytes> {
        if self.parts.is_empty() {
            None
        } else {
            Some(self.parts.remove(0))
        }
    }

    /// Returns the payload frame (the last one).
    pub fn payload(&self) -> Option<&Bytes> {
        self.parts.last()
    }
}

impl From<Bytes> for Message {
    fn from(part: Bytes) -> Self {
        Self::single(part)
    }
}

impl From<Vec<u8>> for Message {
    fn from(part: Vec<u8>) -> Self {
        Self::single(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_push_and_pop() {
        let mut msg = Message::single(Bytes::from_static(b"payload"));
        msg.push_front(Bytes::from_static(b"peer"));

        assert_eq!(msg.len(), 2);
        assert_eq!(msg.payload(), Some(&Bytes::from_static(b"payload")));
        assert_eq!(msg.pop_front(), Some(Bytes::from_static(b"peer")));
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn test_pop_front_on_empty() {
        let mut msg = Message::default();
        assert!(msg.is_empty());
        assert_eq!(msg.pop_front(), None);
        assert_eq!(msg.payload(), None);
    }
}

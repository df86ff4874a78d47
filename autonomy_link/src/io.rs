//! In-memory transport between two peers of the same process
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use tracing::error;

use crate::error::LinkError;

/// Maximum transmission units; maximum size in bytes of a packet
pub(crate) const MTU: usize = 1472;

#[derive(Debug, Clone)]
pub struct CrossbeamIo {
    sender: Sender<Bytes>,
    receiver: Receiver<Bytes>,
}

impl CrossbeamIo {
    pub fn new(sender: Sender<Bytes>, receiver: Receiver<Bytes>) -> Self {
        Self { sender, receiver }
    }

    /// Create a pair of CrossbeamIo instances for local testing
    pub fn new_pair() -> (Self, Self) {
        let (sender1, receiver1) = crossbeam_channel::unbounded();
        let (sender2, receiver2) = crossbeam_channel::unbounded();
        (Self::new(sender1, receiver2), Self::new(sender2, receiver1))
    }

    pub fn send(&self, payload: Bytes) -> Result<(), LinkError> {
        if payload.len() > MTU {
            error!(len = payload.len(), "packet exceeds the MTU");
        }
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::Full,
            TrySendError::Disconnected(_) => LinkError::Disconnected,
        })
    }

    /// Receive the next available packet, if any
    pub fn recv(&self) -> Result<Option<Bytes>, LinkError> {
        match self.receiver.try_recv() {
            Ok(data) => Ok(Some(data)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_pair() {
        let (a, b) = CrossbeamIo::new_pair();
        a.send(Bytes::from_static(b"ping")).unwrap();
        assert_eq!(b.recv().unwrap(), Some(Bytes::from_static(b"ping")));
        assert_eq!(b.recv().unwrap(), None);
        assert_eq!(a.recv().unwrap(), None);

        drop(b);
        assert!(matches!(a.send(Bytes::new()), Err(LinkError::Disconnected)));
        assert!(matches!(a.recv(), Err(LinkError::Disconnected)));
    }
}

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Largest frame a link is expected to carry (Ethernet without jumbo frames).
pub const MAX_FRAME_SIZE: usize = 1518;

/// A 6-byte link-layer (MAC) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    /// Create an address from its six octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns true for the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// The raw octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

/// A connected, ready-to-use raw link.
///
/// Implementations must be usable from two threads at once: the foreground
/// caller sends while a background receiver waits in [`Link::recv_timeout`].
///
/// After [`Link::close`] every receive returns [`LinkError::Closed`]
/// (including one already waiting), and so does every send.
///
/// [`LinkError::Closed`]: crate::LinkError::Closed
pub trait Link: Send + Sync + 'static {
    /// Hardware address of the local endpoint.
    fn local_addr(&self) -> MacAddr;

    /// Send one complete frame.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one frame. `Ok(None)` means nothing arrived.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Bytes>>;

    /// Single non-blocking receive attempt.
    fn try_recv(&self) -> Result<Option<Bytes>> {
        self.recv_timeout(Duration::ZERO)
    }

    /// Close the link. Idempotent.
    fn close(&self);

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl<L: Link + ?Sized> Link for std::sync::Arc<L> {
    fn local_addr(&self) -> MacAddr {
        (**self).local_addr()
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Bytes>> {
        (**self).recv_timeout(timeout)
    }

    fn try_recv(&self) -> Result<Option<Bytes>> {
        (**self).try_recv()
    }

    fn close(&self) {
        (**self).close()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display_is_colon_hex() {
        let mac = MacAddr::new([0x02, 0x00, 0x5e, 0x10, 0xab, 0x01]);
        assert_eq!(mac.to_string(), "02:00:5e:10:ab:01");
        assert_eq!(format!("{mac:?}"), "MacAddr(02:00:5e:10:ab:01)");
    }

    #[test]
    fn broadcast_detection() {
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(!MacAddr::new([0; 6]).is_broadcast());
    }
}

//! Fire-and-forget UDP delivery of reading records.

use crate::Result;
use crate::record::{ReadingRecord, RecordLayout};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Sends each record as one datagram to a fixed target.
///
/// No acknowledgement and no retry.
#[derive(Debug)]
pub struct UdpRelay {
    socket: UdpSocket,
    target: SocketAddr,
    layout: RecordLayout,
}

impl UdpRelay {
    /// Bind an ephemeral local socket of the target's address family.
    pub async fn bind(target: SocketAddr, layout: RecordLayout) -> Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        debug!("Relaying {:?} records to {} from {}", layout, target, socket.local_addr()?);

        Ok(Self {
            socket,
            target,
            layout,
        })
    }

    pub async fn send(&self, record: &ReadingRecord) -> Result<usize> {
        let datagram = record.to_bytes(self.layout);
        let sent = self.socket.send_to(&datagram, self.target).await?;
        trace!(channel = %record.channel, value = record.value, bytes = sent, "Sent record");
        Ok(sent)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_core::ChannelId;

    #[tokio::test]
    async fn test_datagram_per_record() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = UdpRelay::bind(receiver.local_addr().unwrap(), RecordLayout::Packed)
            .await
            .unwrap();
        assert_eq!(relay.layout(), RecordLayout::Packed);
        assert_eq!(relay.target(), receiver.local_addr().unwrap());

        let record = ReadingRecord::new(ChannelId::new(1).unwrap(), 42);
        assert_eq!(relay.send(&record).await.unwrap(), 9);

        let mut buf = [0u8; 64];
        let (len, from) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 9);
        assert_eq!(from.port(), relay.local_addr().unwrap().port());
        assert_eq!(
            ReadingRecord::decode(RecordLayout::Packed, &buf[..len]).unwrap(),
            record
        );
    }
}

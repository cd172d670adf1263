//! UDP network endpoint on smoltcp.

use core::net::{IpAddr, SocketAddr};

use caneth::PORT;
use smoltcp::{
    iface::{Interface, SocketHandle, SocketSet},
    phy::Device,
    socket::udp::{BindError, PacketBuffer, RecvError, SendError, Socket},
    time::Instant,
    wire::{IpAddress, IpEndpoint},
};
use thiserror_no_std::Error;

use crate::endpoint::NetworkEndpoint;

/// UDP endpoint errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum UdpError {
    #[error("bind failed: {0:?}")]
    Bind(BindError),
    #[error("send failed: {0:?}")]
    Send(SendError),
    #[error("receive failed: {0:?}")]
    Recv(RecvError),
    /// Only IPv4 remotes can be addressed.
    #[error("unsupported remote address")]
    Unsupported,
}

/// Network endpoint owning a smoltcp interface and a single UDP socket.
///
/// Every call pumps the interface once, so the endpoint needs no separate
/// network task.
pub struct UdpEndpoint<'a, D: Device> {
    // stack
    iface: Interface,
    device: D,
    sockets: SocketSet<'a>,

    // configuration
    handle: SocketHandle,
    port: u16,
    clock: fn() -> Instant,
}

impl<'a, D: Device> UdpEndpoint<'a, D> {
    /// Creates a new [`UdpEndpoint`] listening on [`PORT`] once opened.
    pub fn new(
        iface: Interface,
        device: D,
        mut sockets: SocketSet<'a>,
        rx_buffer: PacketBuffer<'a>,
        tx_buffer: PacketBuffer<'a>,
        clock: fn() -> Instant,
    ) -> Self {
        let socket = Socket::new(rx_buffer, tx_buffer);
        let handle = sockets.add(socket);

        UdpEndpoint {
            iface,
            device,
            sockets,
            handle,
            port: PORT,
            clock,
        }
    }

    /// Listen on another local port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn interface(&self) -> &Interface {
        &self.iface
    }

    pub fn interface_mut(&mut self) -> &mut Interface {
        &mut self.iface
    }

    /// Perform buffered transactions.
    pub fn poll(&mut self) -> bool {
        let now = (self.clock)();
        self.iface.poll(now, &mut self.device, &mut self.sockets)
    }
}

impl<'a, D: Device> NetworkEndpoint for UdpEndpoint<'a, D> {
    type Error = UdpError;

    fn open(&mut self) -> Result<(), UdpError> {
        let socket = self.sockets.get_mut::<Socket>(self.handle);

        if !socket.is_open() {
            socket.bind(self.port).map_err(UdpError::Bind)?;
        }

        Ok(())
    }

    fn close(&mut self) {
        self.sockets.get_mut::<Socket>(self.handle).close();
    }

    fn send_to(
        &mut self,
        remote: SocketAddr,
        datagram: &[u8],
    ) -> Result<(), UdpError> {
        let endpoint = ip_endpoint(remote)?;

        let socket = self.sockets.get_mut::<Socket>(self.handle);
        socket.send_slice(datagram, endpoint).map_err(UdpError::Send)?;

        self.poll();
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, UdpError> {
        self.poll();

        let socket = self.sockets.get_mut::<Socket>(self.handle);
        if !socket.can_recv() {
            return Ok(None);
        }

        let (payload, _meta) = socket.recv().map_err(UdpError::Recv)?;
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);

        Ok(Some(len))
    }
}

fn ip_endpoint(remote: SocketAddr) -> Result<IpEndpoint, UdpError> {
    match remote.ip() {
        IpAddr::V4(addr) => {
            let [a, b, c, d] = addr.octets();
            Ok(IpEndpoint {
                addr: IpAddress::v4(a, b, c, d),
                port: remote.port(),
            })
        }
        IpAddr::V6(_) => Err(UdpError::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caneth::{CanFrame, Flags, DATAGRAM_LEN};
    use core::net::{Ipv4Addr, Ipv6Addr};
    use core::sync::atomic::{AtomicI64, Ordering};
    use smoltcp::{
        iface::Config,
        phy::{Loopback, Medium},
        socket::udp::PacketMetadata,
        wire::{EthernetAddress, IpCidr},
    };

    static NOW: AtomicI64 = AtomicI64::new(0);

    fn clock() -> Instant {
        Instant::from_millis(NOW.fetch_add(10, Ordering::Relaxed))
    }

    fn endpoint() -> UdpEndpoint<'static, Loopback> {
        let mut device = Loopback::new(Medium::Ethernet);
        let config = Config::new(EthernetAddress([0x02, 0, 0, 0, 0, 1]).into());
        let mut iface = Interface::new(config, &mut device, clock());
        iface.update_ip_addrs(|addrs| {
            addrs
                .push(IpCidr::new(IpAddress::v4(127, 0, 0, 1), 8))
                .unwrap();
        });

        let rx_buffer =
            PacketBuffer::new(vec![PacketMetadata::EMPTY; 4], vec![0; 256]);
        let tx_buffer =
            PacketBuffer::new(vec![PacketMetadata::EMPTY; 4], vec![0; 256]);

        UdpEndpoint::new(
            iface,
            device,
            SocketSet::new(vec![]),
            rx_buffer,
            tx_buffer,
            clock,
        )
    }

    #[test]
    fn nothing_pending() {
        let mut endpoint = endpoint();
        endpoint.open().unwrap();

        let mut buf = [0u8; DATAGRAM_LEN];
        assert_eq!(endpoint.recv(&mut buf), Ok(None));
    }

    #[test]
    fn loopback_datagram() {
        let mut endpoint = endpoint();
        endpoint.open().unwrap();
        // opening twice keeps the binding
        endpoint.open().unwrap();

        let frame =
            CanFrame::from_raw(0x123, &[1, 2, 3], Flags::empty()).unwrap();
        let own = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), PORT);
        endpoint.send_to(own, &caneth::encode(&frame)).unwrap();

        let mut buf = [0u8; DATAGRAM_LEN];
        let mut received = None;
        for _ in 0..20 {
            if let Some(len) = endpoint.recv(&mut buf).unwrap() {
                received = Some(len);
                break;
            }
        }

        assert_eq!(received, Some(DATAGRAM_LEN));
        assert_eq!(caneth::decode(&buf), Ok(frame));
    }

    #[test]
    fn ipv6_remote_rejected() {
        let mut endpoint = endpoint();
        endpoint.open().unwrap();

        let remote = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), PORT);
        assert_eq!(
            endpoint.send_to(remote, &[0; 4]),
            Err(UdpError::Unsupported)
        );
    }

    #[test]
    fn send_requires_open_socket() {
        let mut endpoint = endpoint();
        let remote = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), PORT);

        assert_eq!(
            endpoint.send_to(remote, &[0; 4]),
            Err(UdpError::Send(SendError::Unaddressable))
        );
    }
}

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;

/// Unacknowledged datagram transport used by the statsd sink.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    async fn send(&self, datagram: Bytes) -> io::Result<()>;

    /// Release the underlying socket. Later sends fail.
    fn close(&self) {}

    /// Human-readable target for logs.
    fn target(&self) -> String;
}

/// UDP datagrams to a fixed host:port.
pub struct UdpTransport {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    target: SocketAddr,
}

impl UdpTransport {
    /// Resolve `host:port` and bind an ephemeral local socket of the same family.
    ///
    /// IP literals are used as-is. Host names go through the system resolver,
    /// which blocks the calling thread.
    pub fn bind(host: &str, port: u16, runtime: &Handle) -> io::Result<Self> {
        let target = match host.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, port),
            Err(_) => (host, port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{host} did not resolve")))?,
        };

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let std_socket = std::net::UdpSocket::bind(local)?;
        std_socket.set_nonblocking(true)?;

        // from_std registers with the reactor of the entered runtime
        let _guard = runtime.enter();
        let socket = UdpSocket::from_std(std_socket)?;

        Ok(Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            target,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.target
    }

    fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send(&self, datagram: Bytes) -> io::Result<()> {
        let socket = self
            .socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))?;
        socket.send_to(&datagram, self.target).await?;
        Ok(())
    }

    fn close(&self) {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn target(&self) -> String {
        self.target.to_string()
    }
}

mod socket {
    use crate::error::{ErrorKind, IoError, IoOperation, IoResult};
    use crate::net::socket::Socket;
    use itertools::Itertools;
    use nix::{
        sys::select::FdSet,
        sys::time::{TimeVal, TimeValLike},
        Error,
    };
    use socket2::{Domain, Protocol, SockAddr, Type};
    use std::io;
    use std::io::Read;
    use std::net::SocketAddr;
    use std::os::fd::AsFd;
    use std::time::Duration;
    use tracing::instrument;

    /// A network socket.
    pub struct SocketImpl {
        inner: socket2::Socket,
    }

    impl SocketImpl {
        fn new(domain: Domain, ty: Type, protocol: Protocol) -> IoResult<Self> {
            Ok(Self {
                inner: socket2::Socket::new(domain, ty, Some(protocol))
                    .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?,
            })
        }

        fn new_raw_ipv4(protocol: Protocol) -> IoResult<Self> {
            Self::new(Domain::IPV4, Type::RAW, protocol)
        }

        fn new_raw_ipv6(protocol: Protocol) -> IoResult<Self> {
            Self::new(Domain::IPV6, Type::RAW, protocol)
        }

        fn new_dgram_ipv4(protocol: Protocol) -> IoResult<Self> {
            Self::new(Domain::IPV4, Type::DGRAM, protocol)
        }

        fn new_dgram_ipv6(protocol: Protocol) -> IoResult<Self> {
            Self::new(Domain::IPV6, Type::DGRAM, protocol)
        }

        fn set_nonblocking(&self, nonblocking: bool) -> IoResult<()> {
            self.inner
                .set_nonblocking(nonblocking)
                .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))
        }
    }

    impl Socket for SocketImpl {
        #[instrument(level = "trace")]
        fn new_icmp_send_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new_raw_ipv4(Protocol::ICMPV4)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_icmp_send_socket_ipv6() -> IoResult<Self> {
            let socket = Self::new_raw_ipv6(Protocol::ICMPV6)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_recv_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new_raw_ipv4(Protocol::ICMPV4)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_recv_socket_ipv6() -> IoResult<Self> {
            let socket = Self::new_raw_ipv6(Protocol::ICMPV6)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_udp_dgram_socket_ipv4() -> IoResult<Self> {
            Self::new_dgram_ipv4(Protocol::UDP)
        }
        #[instrument(level = "trace")]
        fn new_udp_dgram_socket_ipv6() -> IoResult<Self> {
            Self::new_dgram_ipv6(Protocol::UDP)
        }
        #[instrument(skip(self), level = "trace")]
        fn connect(&mut self, address: SocketAddr) -> IoResult<()> {
            tracing::trace!(?address);
            self.inner
                .connect(&SockAddr::from(address))
                .map_err(|err| IoError::Connect(err, address))
        }
        #[instrument(skip(self), level = "trace")]
        fn set_ttl(&mut self, ttl: u32) -> IoResult<()> {
            self.inner
                .set_ttl(ttl)
                .map_err(|err| IoError::Other(err, IoOperation::SetTtl))
        }
        #[instrument(skip(self), level = "trace")]
        fn set_unicast_hops_v6(&mut self, hops: u8) -> IoResult<()> {
            self.inner
                .set_unicast_hops_v6(u32::from(hops))
                .map_err(|err| IoError::Other(err, IoOperation::SetUnicastHopsV6))
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> IoResult<()> {
            tracing::trace!(buf = format!("{:02x?}", buf.iter().format(" ")), ?addr);
            self.inner
                .send_to(buf, &SockAddr::from(addr))
                .map_err(|err| IoError::SendTo(err, addr))?;
            Ok(())
        }
        #[instrument(skip(self), level = "trace")]
        fn is_readable(&mut self, timeout: Duration) -> IoResult<bool> {
            let mut read = FdSet::new();
            read.insert(self.inner.as_fd());
            let readable = nix::sys::select::select(
                None,
                Some(&mut read),
                None,
                None,
                Some(&mut TimeVal::milliseconds(timeout.as_millis() as i64)),
            );
            match readable {
                Ok(readable) => Ok(readable == 1),
                Err(Error::EINTR) => Ok(false),
                Err(err) => Err(IoError::Other(
                    std::io::Error::from(err),
                    IoOperation::Select,
                )),
            }
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn recv_from(&mut self, buf: &mut [u8]) -> IoResult<(usize, Option<SocketAddr>)> {
            let (bytes_read, addr) = self
                .inner
                .recv_from_into_buf(buf)
                .map_err(|err| IoError::Other(err, IoOperation::RecvFrom))?;
            tracing::trace!(
                buf = format!("{:02x?}", buf[..bytes_read].iter().format(" ")),
                bytes_read,
                ?addr
            );
            Ok((bytes_read, addr))
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
            let bytes_read = self
                .inner
                .read(buf)
                .map_err(|err| IoError::Other(err, IoOperation::Read))?;
            tracing::trace!(
                buf = format!("{:02x?}", buf[..bytes_read].iter().format(" ")),
                bytes_read
            );
            Ok(bytes_read)
        }
        #[instrument(skip(self), level = "trace")]
        fn local_addr(&mut self) -> IoResult<Option<SocketAddr>> {
            let addr = self
                .inner
                .local_addr()
                .map_err(|err| IoError::Other(err, IoOperation::LocalAddr))?
                .as_socket();
            tracing::trace!(?addr);
            Ok(addr)
        }
    }

    impl From<&io::Error> for ErrorKind {
        fn from(value: &io::Error) -> Self {
            if value.raw_os_error() == io::Error::from(Error::EINPROGRESS).raw_os_error() {
                Self::InProgress
            } else if value.raw_os_error() == io::Error::from(Error::EHOSTUNREACH).raw_os_error() {
                Self::HostUnreachable
            } else if value.raw_os_error() == io::Error::from(Error::ENETUNREACH).raw_os_error() {
                Self::NetUnreachable
            } else {
                Self::Std(value.kind())
            }
        }
    }

    // only used for unit tests
    impl From<ErrorKind> for io::Error {
        fn from(value: ErrorKind) -> Self {
            match value {
                ErrorKind::InProgress => Self::from(Error::EINPROGRESS),
                ErrorKind::HostUnreachable => Self::from(Error::EHOSTUNREACH),
                ErrorKind::NetUnreachable => Self::from(Error::ENETUNREACH),
                ErrorKind::Std(kind) => Self::from(kind),
            }
        }
    }

    impl Read for SocketImpl {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    /// An extension trait to allow `recv_from` method which writes to a `&mut [u8]`.
    ///
    /// This is required for `socket2::Socket` which [does not currently provide] this method.
    ///
    /// [does not currently provide]: https://github.com/rust-lang/socket2/issues/223
    trait RecvFrom {
        fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;
    }

    impl RecvFrom for socket2::Socket {
        // Safety: the `recv` implementation promises not to write uninitialised
        // bytes to the `buf`fer, so this casting is safe.
        #![allow(unsafe_code)]
        fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
            let buf = unsafe {
                &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [std::mem::MaybeUninit<u8>])
            };
            self.recv_from(buf)
                .map(|(size, addr)| (size, addr.as_socket()))
        }
    }
}

pub use socket::SocketImpl;

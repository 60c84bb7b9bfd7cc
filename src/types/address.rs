//! TCP address extension carried by BEGIN and ROUTE records.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use super::{CodecError, Cursor};

const FAMILY_INET: u8 = 4;
const FAMILY_INET6: u8 = 6;

/// Source and destination addresses of one accepted or connected socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpAddressExt {
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

impl TcpAddressExt {
    pub fn encode(&self, out: &mut Vec<u8>) {
        encode_addr(self.local, out);
        encode_port(self.local, out);
        encode_ip_only(self.remote, out);
        encode_port(self.remote, out);
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(raw);
        let family = cursor.u8("address family")?;
        let local_ip = decode_ip(&mut cursor, family)?;
        let local_port = cursor.u16("local port")?;
        let remote_ip = decode_ip(&mut cursor, family)?;
        let remote_port = cursor.u16("remote port")?;
        Ok(Self {
            local: SocketAddr::new(local_ip, local_port),
            remote: SocketAddr::new(remote_ip, remote_port),
        })
    }

    pub fn to_extension(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40);
        self.encode(&mut out);
        out
    }
}

/// Local address plus optional remote filter, as carried by ROUTE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteAddressExt {
    pub local: SocketAddr,
    pub remote: Option<SocketAddr>,
}

impl RouteAddressExt {
    pub fn encode(&self, out: &mut Vec<u8>) {
        encode_addr(self.local, out);
        encode_port(self.local, out);
        match self.remote {
            Some(remote) => {
                out.push(1);
                encode_ip_only(remote, out);
                encode_port(remote, out);
            }
            None => out.push(0),
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(raw);
        let family = cursor.u8("address family")?;
        let local_ip = decode_ip(&mut cursor, family)?;
        let local_port = cursor.u16("local port")?;
        let remote = match cursor.u8("remote flag")? {
            0 => None,
            _ => {
                let ip = decode_ip(&mut cursor, family)?;
                let port = cursor.u16("remote port")?;
                Some(SocketAddr::new(ip, port))
            }
        };
        Ok(Self {
            local: SocketAddr::new(local_ip, local_port),
            remote,
        })
    }

    pub fn to_extension(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(42);
        self.encode(&mut out);
        out
    }
}

fn encode_addr(addr: SocketAddr, out: &mut Vec<u8>) {
    match addr.ip() {
        IpAddr::V4(ip) => {
            out.push(FAMILY_INET);
            out.extend_from_slice(&ip.octets());
        }
        IpAddr::V6(ip) => {
            out.push(FAMILY_INET6);
            out.extend_from_slice(&ip.octets());
        }
    }
}

fn encode_ip_only(addr: SocketAddr, out: &mut Vec<u8>) {
    match addr.ip() {
        IpAddr::V4(ip) => out.extend_from_slice(&ip.octets()),
        IpAddr::V6(ip) => out.extend_from_slice(&ip.octets()),
    }
}

fn encode_port(addr: SocketAddr, out: &mut Vec<u8>) {
    out.extend_from_slice(&addr.port().to_le_bytes());
}

fn decode_ip(cursor: &mut Cursor<'_>, family: u8) -> Result<IpAddr, CodecError> {
    match family {
        FAMILY_INET => {
            let mut octets = [0u8; 4];
            for octet in &mut octets {
                *octet = cursor.u8("ipv4 address")?;
            }
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        FAMILY_INET6 => {
            let mut octets = [0u8; 16];
            for octet in &mut octets {
                *octet = cursor.u8("ipv6 address")?;
            }
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        got => Err(CodecError::UnknownAddressFamily { got }),
    }
}

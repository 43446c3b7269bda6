// Copyright (C) 2021  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

//! IPv4 address/endpoint value types used throughout the relay.
//!
//! The wire format only ever deals in dotted-quad IPv4 and decimal ports, so
//! we keep a thin `Endpoint` wrapper around `std::net::SocketAddrV4` rather
//! than reaching for the more general `SocketAddr`.

use std::fmt;
use std::net::{AddrParseError, Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EndpointParseError {
    #[error("'{0}' is not an IP:port string")]
    Malformed(String),

    #[error("invalid IPv4 address: {0}")]
    Address(#[from] AddrParseError),

    #[error("invalid port: {0}")]
    Port(#[from] std::num::ParseIntError),
}

/// A validated `ipv4:port` endpoint, as used for `Config::listen` and the
/// addresses carried in a PROXY header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddrV4);

impl Endpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self(SocketAddrV4::new(ip, port))
    }

    pub fn ip(&self) -> Ipv4Addr {
        *self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    /// Parses `ip:port`, e.g. `127.0.0.1:8080`. Rejects anything that isn't
    /// a plain IPv4 address (no hostnames, no IPv6, no surrounding brackets).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip_str, port_str) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::Malformed(s.to_string()))?;
        let ip: Ipv4Addr = ip_str.parse()?;
        let port: u16 = port_str.parse()?;
        Ok(Self::new(ip, port))
    }
}

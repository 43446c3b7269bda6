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

use std::net::{AddrParseError, Ipv4Addr};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Maximum length of a TCP4 PROXY v1 line, CRLF included:
/// `PROXY TCP4 <ipv4> <ipv4> <port> <port>\r\n`.
pub const MAX_HEADER_SIZE: usize = 56;

/// How long we'll wait for a complete header before giving up on a peer.
const HEADER_DEADLINE: Duration = Duration::from_secs(60);

/// The four address fields carried by a TCP4 PROXY v1 header.
///
/// Only `src_ip`, `src_port` and `dst_port` drive behavior downstream;
/// `dst_ip` is kept for completeness but never consulted, since the backend
/// is always loopback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyHeader {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_ip: Ipv4Addr,
    pub dst_port: u16,
}

#[derive(Error, Debug)]
pub enum ProxyHeaderError {
    #[error("timed out waiting for PROXY header")]
    Timeout,

    #[error("unexpected EOF while reading PROXY header")]
    UnexpectedEof,

    #[error("header too long / malformed")]
    TooLong,

    #[error("Not a PROXY protocol header")]
    NotProxy,

    #[error("Only TCP4 is supported")]
    UnsupportedProtocol,

    #[error("invalid address in PROXY header: {0}")]
    Address(#[from] AddrParseError),

    #[error("invalid port in PROXY header: {0}")]
    Port(#[from] std::num::ParseIntError),

    #[error("I/O error reading PROXY header: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads a TCP4 PROXY v1 header off `stream`, returning the parsed header
/// together with any bytes already read past the terminating `\r\n`.
///
/// Bounded to [`MAX_HEADER_SIZE`] bytes and [`HEADER_DEADLINE`]; a stalled
/// peer is cancelled by the surrounding timeout, which drops the in-flight
/// read.
pub async fn read_header<S>(stream: &mut S) -> Result<(ProxyHeader, Bytes), ProxyHeaderError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    match tokio::time::timeout(HEADER_DEADLINE, read_raw(stream)).await {
        Ok(result) => result,
        Err(_) => Err(ProxyHeaderError::Timeout),
    }
}

async fn read_raw<S>(stream: &mut S) -> Result<(ProxyHeader, Bytes), ProxyHeaderError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(MAX_HEADER_SIZE);
    buf.resize(MAX_HEADER_SIZE, 0);
    let mut filled = 0usize;

    let crlf_at = loop {
        if let Some(pos) = buf[..filled].windows(2).position(|w| w == b"\r\n") {
            break pos;
        }
        if filled == MAX_HEADER_SIZE {
            return Err(ProxyHeaderError::TooLong);
        }
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProxyHeaderError::UnexpectedEof);
        }
        filled += n;
    };

    let mut buf = buf.split_to(filled).freeze();
    let residual = buf.split_off(crlf_at + 2);
    let header_line = &buf[..crlf_at];
    let header = parse_header_line(header_line)?;
    Ok((header, residual))
}

fn parse_header_line(line: &[u8]) -> Result<ProxyHeader, ProxyHeaderError> {
    let line = std::str::from_utf8(line).map_err(|_| ProxyHeaderError::NotProxy)?;
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.first().copied() != Some("PROXY") {
        return Err(ProxyHeaderError::NotProxy);
    }
    if tokens.get(1).copied() != Some("TCP4") {
        return Err(ProxyHeaderError::UnsupportedProtocol);
    }
    if tokens.len() != 6 {
        return Err(ProxyHeaderError::NotProxy);
    }
    let src_ip: Ipv4Addr = tokens[2].parse()?;
    let dst_ip: Ipv4Addr = tokens[3].parse()?;
    let src_port: u16 = tokens[4].parse()?;
    let dst_port: u16 = tokens[5].parse()?;

    Ok(ProxyHeader {
        src_ip,
        src_port,
        dst_ip,
        dst_port,
    })
}

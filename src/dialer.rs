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

//! Dials the loopback backend from a socket bound to the visitor's own
//! source address, so the backend's `accept()` observes the real client
//! 4-tuple instead of ours.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::unix::io::AsRawFd;

use thiserror::Error;
use tokio::net::{TcpSocket, TcpStream};

use crate::proxy::ProxyHeader;

const LOOPBACK: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

/// Fail fast: loopback never drops a SYN, so there's no reason to retry it
/// the usual handful of times.
const TCP_SYNCNT: i32 = 2;

#[derive(Error, Debug)]
pub enum DialError {
    #[error("cannot create backend socket: {0}")]
    Socket(#[source] io::Error),

    #[error("IP_TRANSPARENT requires CAP_NET_ADMIN (need to be root): {0}")]
    NotTransparent(#[source] io::Error),

    #[error("cannot set {option} on backend socket: {source}")]
    SetSockOpt {
        option: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot bind backend socket to {addr}: {source}")]
    Bind {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to backend {addr}: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
}

/// Opens a TCP connection to `127.0.0.1:<header.dst_port>`, bound to
/// `(header.src_ip, header.src_port)` with transparent-source options set,
/// so the backend sees the visitor's own address as its peer.
pub async fn dial(header: &ProxyHeader, mark: i32) -> Result<TcpStream, DialError> {
    let socket = TcpSocket::new_v4().map_err(DialError::Socket)?;
    set_transparent_options(&socket, mark)?;

    let bind_addr = SocketAddrV4::new(header.src_ip, header.src_port);
    socket
        .bind(bind_addr.into())
        .map_err(|source| DialError::Bind {
            addr: bind_addr,
            source,
        })?;

    let connect_addr = SocketAddrV4::new(LOOPBACK, header.dst_port);
    socket
        .connect(connect_addr.into())
        .await
        .map_err(|source| DialError::Connect {
            addr: connect_addr,
            source,
        })
}

#[cfg(target_os = "linux")]
fn set_transparent_options(socket: &TcpSocket, mark: i32) -> Result<(), DialError> {
    let fd = socket.as_raw_fd();

    set_sockopt(fd, libc::IPPROTO_TCP, libc::TCP_SYNCNT, TCP_SYNCNT)
        .map_err(|source| DialError::SetSockOpt {
            option: "TCP_SYNCNT",
            source,
        })?;

    set_sockopt(fd, libc::SOL_IP, libc::IP_TRANSPARENT, 1).map_err(|source| {
        if source.raw_os_error() == Some(libc::EPERM) {
            DialError::NotTransparent(source)
        } else {
            DialError::SetSockOpt {
                option: "IP_TRANSPARENT",
                source,
            }
        }
    })?;

    socket
        .set_reuseaddr(true)
        .map_err(|source| DialError::SetSockOpt {
            option: "SO_REUSEADDR",
            source,
        })?;

    set_sockopt(fd, libc::SOL_SOCKET, libc::SO_MARK, mark)
        .map_err(|source| DialError::SetSockOpt {
            option: "SO_MARK",
            source,
        })?;

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_transparent_options(_socket: &TcpSocket, _mark: i32) -> Result<(), DialError> {
    Err(DialError::SetSockOpt {
        option: "IP_TRANSPARENT",
        source: io::Error::new(
            io::ErrorKind::Unsupported,
            "transparent source dialing is only implemented on Linux",
        ),
    })
}

#[cfg(target_os = "linux")]
fn set_sockopt(fd: std::os::unix::io::RawFd, level: i32, name: i32, value: i32) -> io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const i32 as *const libc::c_void,
            std::mem::size_of::<i32>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

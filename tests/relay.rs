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

//! End-to-end scenarios driven over real loopback sockets: a fake frontend
//! sends a PROXY header, a fake backend listens on loopback, and we assert
//! on what each side observes.
//!
//! These run only where `IP_TRANSPARENT`/`SO_MARK` are actually usable (root
//! or `CAP_NET_ADMIN`), since the dialer's bind-before-connect step requires
//! them; elsewhere they're `#[ignore]`d rather than silently skipped.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rvi_relay::config::Config;
use rvi_relay::halt;

async fn spawn_relay(listen_port: u16, mark: i32) -> halt::Trigger {
    let config = Config {
        listen: rvi_relay::address::Endpoint::new(Ipv4Addr::new(127, 0, 0, 1), listen_port),
        mark,
        table: 0,
    };
    let log = slog::Logger::root(slog::Discard, slog::o!());
    let (trigger, tripwire) = halt::new_trigger();

    tokio::spawn(async move {
        let _ = rvi_relay::run(config, log, tripwire).await;
    });
    // Give the listener a moment to bind before the test connects.
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger
}

#[tokio::test]
#[ignore = "requires CAP_NET_ADMIN for IP_TRANSPARENT; run manually as root"]
async fn happy_path_forwards_payload_and_preserves_source_address() {
    let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dst_port = backend_listener.local_addr().unwrap().port();

    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = relay_listener.local_addr().unwrap().port();
    drop(relay_listener);

    let _trigger = spawn_relay(relay_port, 0).await;

    let mut frontend = TcpStream::connect(("127.0.0.1", relay_port)).await.unwrap();
    let header = format!("PROXY TCP4 10.1.2.3 10.0.0.5 40000 {}\r\nHELLO", dst_port);
    frontend.write_all(header.as_bytes()).await.unwrap();

    let (mut backend, backend_peer) = backend_listener.accept().await.unwrap();
    assert_eq!(backend_peer.ip(), Ipv4Addr::new(10, 1, 2, 3));
    assert_eq!(backend_peer.port(), 40000);

    let mut buf = [0u8; 5];
    backend.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"HELLO");

    backend.write_all(b"WORLD\n").await.unwrap();
    let mut buf = [0u8; 6];
    frontend.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"WORLD\n");
}

#[tokio::test]
async fn split_header_is_reassembled_before_parsing() {
    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = relay_listener.local_addr().unwrap().port();
    drop(relay_listener);

    let _trigger = spawn_relay(relay_port, 0).await;

    let mut frontend = TcpStream::connect(("127.0.0.1", relay_port)).await.unwrap();
    frontend
        .write_all(b"PROXY TCP4 10.1.2.3 10.0.0.5 ")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    frontend.write_all(b"40000 1\r\n").await.unwrap();

    // Without CAP_NET_ADMIN the dial itself fails, but the important
    // assertion here is that the header was accepted at all: the
    // connection is held open past the point a malformed/rejected header
    // would have dropped it immediately.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut probe = [0u8; 1];
    let result = tokio::time::timeout(Duration::from_millis(10), frontend.read(&mut probe)).await;
    assert!(result.is_err(), "connection should still be open/pending, not closed with an error response");
}

#[tokio::test]
async fn unsupported_protocol_tag_is_rejected_without_dialing_backend() {
    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = relay_listener.local_addr().unwrap().port();
    drop(relay_listener);

    let _trigger = spawn_relay(relay_port, 0).await;

    let mut frontend = TcpStream::connect(("127.0.0.1", relay_port)).await.unwrap();
    frontend
        .write_all(b"PROXY TCP6 ::1 ::1 1 2\r\n")
        .await
        .unwrap();

    let mut buf = Vec::new();
    let _ = frontend.read_to_end(&mut buf).await;
    assert!(buf.is_empty(), "relay must not echo or proxy anything for a rejected header");
}

#[tokio::test]
async fn shutdown_stops_accepting_new_connections() {
    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = relay_listener.local_addr().unwrap().port();
    drop(relay_listener);

    let trigger = spawn_relay(relay_port, 0).await;
    trigger.fire();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = TcpStream::connect(("127.0.0.1", relay_port)).await;
    assert!(result.is_err(), "listener must be closed after shutdown");
}

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

//! Bidirectional byte-pump between the peer and the backend, with half-close
//! propagation matching plain TCP proxy semantics.

use std::net::Shutdown;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const BUFFER_SIZE: usize = 8 * 1024;

/// Runs both copy directions to completion and returns once the connection
/// is fully torn down in both directions.
///
/// `peer` is the front-end connection that carried the PROXY header; `backend`
/// is the loopback connection opened by [`crate::dialer::dial`]. Any residual
/// bytes captured by the header reader must already have been written to
/// `backend` by the caller before this is invoked.
pub async fn run(peer: TcpStream, backend: TcpStream) {
    let (peer_read, peer_write) = peer.into_split();
    let (backend_read, backend_write) = backend.into_split();

    tokio::join!(
        copy(peer_read, backend_write),
        copy(backend_read, peer_write),
    );
}

async fn copy(
    mut source: tokio::net::tcp::OwnedReadHalf,
    mut sink: tokio::net::tcp::OwnedWriteHalf,
) {
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => {
                let _ = sink.shutdown().await;
                return;
            }
            Ok(n) => n,
            Err(_) => {
                // Read error (including cancellation-shaped errors from a
                // socket closed out from under us): tear down both sides of
                // the sink. A cancelled task never gets here at all, since
                // dropping the future is how cancellation happens.
                let _ = sink.as_ref().shutdown(Shutdown::Both);
                return;
            }
        };

        if let Err(_) = sink.write_all(&buf[..n]).await {
            let _ = source.as_ref().shutdown(Shutdown::Read);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accept, connect) = tokio::join!(listener.accept(), connect);
        (accept.unwrap().0, connect.unwrap())
    }

    #[tokio::test]
    async fn forwards_bytes_in_both_directions() {
        let (peer_a, peer_b) = loopback_pair().await;
        let (backend_a, backend_b) = loopback_pair().await;

        let splice = tokio::spawn(run(peer_a, backend_a));

        let mut peer_b = peer_b;
        let mut backend_b = backend_b;

        peer_b.write_all(b"HELLO").await.unwrap();
        let mut buf = [0u8; 5];
        backend_b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"HELLO");

        backend_b.write_all(b"WORLD\n").await.unwrap();
        let mut buf = [0u8; 6];
        peer_b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"WORLD\n");

        drop(peer_b);
        drop(backend_b);
        splice.await.unwrap();
    }

    #[tokio::test]
    async fn peer_eof_half_closes_backend_write_side() {
        let (peer_a, peer_b) = loopback_pair().await;
        let (backend_a, backend_b) = loopback_pair().await;

        let splice = tokio::spawn(run(peer_a, backend_a));

        drop(peer_b);

        let mut backend_b = backend_b;
        let mut buf = Vec::new();
        // Backend's read side observes EOF once the peer->backend direction
        // shuts down backend's write half and the reply direction also
        // drains (no data was ever sent the other way).
        let _ = backend_b.read_to_end(&mut buf).await;
        assert!(buf.is_empty());

        drop(backend_b);
        splice.await.unwrap();
    }
}

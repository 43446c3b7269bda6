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

//! One Session per accepted connection: reads the PROXY header, dials the
//! spoofed-source backend connection, and runs the splice to completion.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::dialer;
use crate::metrics::Metrics;
use crate::proxy;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static LIVE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Number of Sessions currently between `accept` and splice completion.
pub fn live_count() -> usize {
    LIVE_COUNT.load(Ordering::SeqCst)
}

/// Guard that decrements [`live_count`] when a Session ends, however it ends.
struct LiveGuard;

impl LiveGuard {
    fn new() -> Self {
        LIVE_COUNT.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        LIVE_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives one accepted connection from PROXY header to splice completion.
///
/// Runs entirely for its logging/bookkeeping side effects: a Session never
/// propagates an error to its caller, since a per-Session failure must never
/// take down the acceptor (see the error handling taxonomy this mirrors).
pub async fn serve(peer: TcpStream, mark: i32, log: slog::Logger, metrics: &Metrics) {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let _live = LiveGuard::new();
    let log = log.new(slog::o!("session" => id));
    metrics.sessions_opened.inc();

    match run(peer, mark, &log).await {
        Ok(()) => metrics.sessions_closed.inc(),
        Err(err) => {
            slog::error!(log, "session failed"; "cause" => %err);
            metrics.sessions_rejected.inc();
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum SessionError {
    #[error("PROXY header: {0}")]
    Header(#[from] proxy::ProxyHeaderError),

    #[error("backend dial: {0}")]
    Dial(#[from] dialer::DialError),

    #[error("writing residual payload to backend: {0}")]
    Residual(#[source] std::io::Error),
}

async fn run(mut peer: TcpStream, mark: i32, log: &slog::Logger) -> Result<(), SessionError> {
    let (header, residual) = proxy::read_header(&mut peer).await?;
    slog::debug!(log, "parsed PROXY header";
        "src" => %header.src_ip, "src_port" => header.src_port,
        "dst_port" => header.dst_port);

    let mut backend = dialer::dial(&header, mark).await?;
    slog::debug!(log, "connected to backend");

    if !residual.is_empty() {
        backend
            .write_all(&residual)
            .await
            .map_err(SessionError::Residual)?;
    }

    crate::splice::run(peer, backend).await;
    slog::debug!(log, "session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn live_count_returns_to_zero_when_header_is_rejected() {
        let before = live_count();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"NOT A PROXY HEADER\r\n").await.unwrap();
            // Hold the connection open briefly so the Session has time to
            // observe and reject the header before we drop it.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let (peer, _) = listener.accept().await.unwrap();
        let metrics = Metrics::new();
        serve(
            peer,
            0,
            slog::Logger::root(slog::Discard, slog::o!()),
            &metrics,
        )
        .await;
        client.await.unwrap();

        assert_eq!(live_count(), before);
    }
}

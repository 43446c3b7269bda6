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

//! Transparent TCP relay that spoofs backend connections with the visitor's
//! real address, carried in a HAProxy PROXY protocol v1 preamble.

pub mod address;
pub mod config;
pub mod dialer;
pub mod halt;
pub mod logging;
pub mod proxy;
pub mod session;
pub mod splice;

#[cfg(feature = "prometheus_metrics")]
mod metrics;
#[cfg(not(feature = "prometheus_metrics"))]
#[path = "dummy_metrics.rs"]
mod metrics;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::halt::Tripwire;
use crate::metrics::Metrics;

/// Binds the listener and runs the accept loop until `shutdown` trips.
///
/// Each accepted connection is handed to its own spawned `Session` task
/// immediately; the next `accept` is issued before that Session starts
/// doing any work, so a slow header read or backend dial never delays
/// acceptance of the next connection.
pub async fn run(config: Config, log: slog::Logger, mut shutdown: Tripwire) -> anyhow::Result<()> {
    use anyhow::Context;

    let metrics = Arc::new(Metrics::new());

    let std_listener = {
        let socket = tokio::net::TcpSocket::new_v4().context("creating listening socket")?;
        socket
            .set_reuseaddr(true)
            .context("setting SO_REUSEADDR on listening socket")?;
        let listen_addr: std::net::SocketAddrV4 = config.listen.into();
        socket
            .bind(listen_addr.into())
            .with_context(|| format!("binding listener to {}", config.listen))?;
        socket.listen(1024).context("listening")?
    };
    let listener = std_listener;

    slog::info!(log, "listening"; "addr" => %config.listen);

    loop {
        tokio::select! {
            _ = shutdown.tripped() => {
                slog::info!(log, "shutdown requested, no longer accepting new connections");
                break;
            }
            accepted = accept(&listener) => {
                match accepted {
                    Ok(peer) => {
                        let mark = config.mark;
                        let session_log = log.clone();
                        let session_metrics = metrics.clone();
                        tokio::spawn(async move {
                            session::serve(peer, mark, session_log, &session_metrics).await;
                        });
                    }
                    Err(err) => {
                        slog::error!(log, "accept failed"; "cause" => %err);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn accept(listener: &TcpListener) -> std::io::Result<tokio::net::TcpStream> {
    let (stream, _addr) = listener.accept().await?;
    Ok(stream)
}

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

//! Shutdown signaling, ported from the teacher's `Trigger`/`Tripwire` halt
//! handle onto current `tokio::sync::watch`.

use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Fires a [`Tripwire`]. Cloneable so both the SIGTERM and SIGINT handlers
/// can hold one.
#[derive(Clone)]
pub struct Trigger {
    tx: watch::Sender<bool>,
}

impl Trigger {
    pub fn fire(&self) {
        // Only the value matters; a send error means every Tripwire was
        // dropped, which is fine to ignore on shutdown.
        let _ = self.tx.send(true);
    }
}

/// Observes a [`Trigger`]. Cheap to clone; every holder sees the same fire.
#[derive(Clone)]
pub struct Tripwire {
    rx: watch::Receiver<bool>,
}

impl Tripwire {
    /// Resolves once [`Trigger::fire`] has been called at least once.
    pub async fn tripped(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        // A failing `changed()` means the Trigger was dropped without
        // firing, which we treat the same as a fire: there's nothing left
        // to wait on.
        let _ = self.rx.changed().await;
    }

    pub fn is_tripped(&self) -> bool {
        *self.rx.borrow()
    }
}

pub fn new_trigger() -> (Trigger, Tripwire) {
    let (tx, rx) = watch::channel(false);
    (Trigger { tx }, Tripwire { rx })
}

/// Waits for SIGTERM or SIGINT, then fires `trigger`. Runs until the process
/// is asked to shut down; intended to be spawned once at startup.
pub async fn wait_for_shutdown_signal(trigger: Trigger, log: slog::Logger) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            slog::error!(log, "cannot install SIGTERM handler"; "cause" => %err);
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(err) => {
            slog::error!(log, "cannot install SIGINT handler"; "cause" => %err);
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => slog::info!(log, "received SIGTERM, shutting down"),
        _ = sigint.recv() => slog::info!(log, "received SIGINT, shutting down"),
    }

    trigger.fire();
}

/// Polls `live_count` until it reaches zero or, if `timeout` is set, until
/// the grace period elapses. With no timeout this waits unconditionally,
/// matching the original's `Server::shutdown()`.
pub async fn drain<F>(mut live_count: F, timeout: Option<Duration>, log: &slog::Logger)
where
    F: FnMut() -> usize,
{
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    let wait = async {
        while live_count() > 0 {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    match timeout {
        None => wait.await,
        Some(timeout) => {
            if tokio::time::timeout(timeout, wait).await.is_err() {
                slog::warn!(log, "drain timed out with sessions still active";
                    "active" => live_count(), "timeout_secs" => timeout.as_secs());
            }
        }
    }
}

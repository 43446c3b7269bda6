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

//! Prometheus counters, built only with `--features prometheus_metrics`.
//! See `dummy_metrics.rs` for the no-op stand-in used otherwise.

use prometheus::{IntCounter, Registry};

#[derive(Clone)]
pub struct Metrics {
    pub sessions_opened: IntCounter,
    pub sessions_closed: IntCounter,
    pub sessions_rejected: IntCounter,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let sessions_opened =
            IntCounter::new("rvi_relay_sessions_opened_total", "Sessions accepted").unwrap();
        let sessions_closed = IntCounter::new(
            "rvi_relay_sessions_closed_total",
            "Sessions that completed their splice",
        )
        .unwrap();
        let sessions_rejected = IntCounter::new(
            "rvi_relay_sessions_rejected_total",
            "Sessions terminated before splicing (bad header or dial failure)",
        )
        .unwrap();

        registry.register(Box::new(sessions_opened.clone())).ok();
        registry.register(Box::new(sessions_closed.clone())).ok();
        registry
            .register(Box::new(sessions_rejected.clone()))
            .ok();

        Self {
            sessions_opened,
            sessions_closed,
            sessions_rejected,
            registry,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

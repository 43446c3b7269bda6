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

//! No-op stand-in for `metrics.rs`, used when the `prometheus_metrics`
//! feature is off so call sites never need a `#[cfg]`.

#[derive(Clone, Default)]
pub struct NoopCounter;

impl NoopCounter {
    pub fn inc(&self) {}
}

#[derive(Clone, Default)]
pub struct Metrics {
    pub sessions_opened: NoopCounter,
    pub sessions_closed: NoopCounter,
    pub sessions_rejected: NoopCounter,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

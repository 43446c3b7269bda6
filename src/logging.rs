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

//! Builds the single `slog::Logger` capability threaded through the rest of
//! the crate. There is no global logger here by design: a disabled logger is
//! just a `Logger` wrapping `Discard`, passed down like any other value.

use slog::Drain;

pub const SYSLOG_IDENTIFIER: &str = "progdn-rvi";

/// Returns a `Logger` backed by `slog-syslog` + `slog-async` when `verbose`,
/// or a zero-cost `Discard` logger otherwise.
pub fn build(verbose: bool) -> slog::Logger {
    if !verbose {
        return slog::Logger::root(slog::Discard, slog::o!());
    }

    match slog_syslog::unix_3164(slog_syslog::Facility::LOG_DAEMON) {
        Ok(syslog_drain) => {
            let async_drain = slog_async::Async::new(syslog_drain.fuse()).build().fuse();
            slog::Logger::root(async_drain, slog::o!("identifier" => SYSLOG_IDENTIFIER))
        }
        Err(err) => {
            // No syslog daemon reachable (e.g. in a container without one):
            // fall back to stderr rather than silently dropping logs that
            // the operator explicitly asked for with --verbose.
            let decorator = slog_term::TermDecorator::new().build();
            let term_drain = slog_term::FullFormat::new(decorator).build().fuse();
            let async_drain = slog_async::Async::new(term_drain).build().fuse();
            let log = slog::Logger::root(async_drain, slog::o!());
            slog::warn!(log, "syslog unavailable, logging to stderr instead"; "cause" => format!("{:?}", err));
            log
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_logger_is_cheap_and_accepted_everywhere() {
        let log = build(false);
        slog::info!(log, "this must be a no-op");
    }
}

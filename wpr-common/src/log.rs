// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logger construction shared by the routing crates.

use slog::{Drain, Logger};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Bunyan-formatted logger writing to `path`, truncating any existing file.
pub fn init_file_logger<P: AsRef<Path>>(path: P) -> std::io::Result<Logger> {
    Ok(build_logger(File::create(path)?))
}

pub fn build_logger<W: Write + Send + 'static>(w: W) -> Logger {
    let drain = slog_bunyan::new(w).build().fuse();
    let drain = slog_async::Async::new(drain)
        .chan_size(0x8000)
        .build()
        .fuse();
    slog::Logger::root(drain, slog::o!())
}

/// Synchronous human-readable logger whose output is captured by the test
/// harness.
pub fn test_logger() -> Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

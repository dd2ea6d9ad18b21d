//! One-time logger setup

use log::{info, Level, LevelFilter};
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global logger at `level` (`error` to `trace`, unknown values fall back to
/// `info`). Only the first call has any effect.
pub fn init(level: &str) {
    INIT.call_once(|| {
        let level_filter = level.parse().unwrap_or(LevelFilter::Info);

        let installed = env_logger::Builder::new()
            .format(|buf, record| {
                if record.level() == Level::Info {
                    writeln!(buf, "{}", record.args())
                } else {
                    writeln!(
                        buf,
                        "{} {} [{}] {}",
                        buf.timestamp(),
                        record.level(),
                        record.target(),
                        record.args()
                    )
                }
            })
            .filter_level(level_filter)
            .target(env_logger::Target::Stderr)
            .try_init();

        if installed.is_ok() {
            info!("Logging initialized at {}.", level_filter);
        }
    });
}

/// Whether [`init`] has run
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

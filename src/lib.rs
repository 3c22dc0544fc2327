//! This file is the root of the `fastloops` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`kernels`, `runtime`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the public surface a host adapter needs: views, the engine,
//!     the configuration and the error type.
//! 3.  Providing the one-time logger setup used when diagnosing dispatch decisions.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod error;
pub mod kernels;
pub mod runtime;
pub mod traits;
pub mod types;

mod utils;

//==================================================================================
// 2. Public Re-exports
//==================================================================================
pub use bridge::{compact, count_nonzero, gather, Engine};
pub use config::KernelConfig;
pub use error::KernelError;
pub use runtime::{ChunkRunner, RayonRunner, SerialRunner};
pub use types::{ElementKind, OwnedBuffer, TypedBuffer};

//==================================================================================
// 3. Logging
//==================================================================================
static INIT_LOGGER: Once = Once::new();

/// Routes the crate's `log` output to stderr, or to `log_file` in append mode.
///
/// Only the first call installs a logger; later calls are no-ops. Fails only
/// if `log_file` cannot be opened.
pub fn enable_verbose_logging(log_file: Option<&str>) -> Result<(), KernelError> {
    let file = match log_file {
        Some(path) => Some(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|e| {
                    KernelError::InvalidArgument(format!(
                        "could not open log file '{}': {}",
                        path, e
                    ))
                })?,
        ),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Debug);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

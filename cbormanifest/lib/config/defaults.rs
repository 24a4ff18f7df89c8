//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The permission bits given to the synthetic root directory of every snapshot: read, write and
/// execute for everyone.
pub const DEFAULT_ROOT_MODE: u32 = 0o777;

/// The owner and group id given to the synthetic root directory of every snapshot.
pub const DEFAULT_ROOT_ID: u64 = 0;

/// The log filter used by the command when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// The log filter used by the command in verbose mode.
pub const VERBOSE_LOG_FILTER: &str = "debug";

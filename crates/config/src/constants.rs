//! Fixed, non-configurable layout of a devnet home directory
//!
//! Node processes and other tools locate binaries through these names, so
//! they are not exposed via TOML configuration.

/// Cache root, relative to the devnet home
pub const CACHE_BINARIES_DIR: &str = "cache/binaries";
/// Directory holding the active binary pointers
pub const BIN_DIR: &str = "bin";
/// Devnet metadata file
pub const DEVNET_METADATA_FILE: &str = "devnet.json";
/// Per-entry metadata file inside a cache entry
pub const CACHE_METADATA_FILE: &str = "metadata.json";
pub const EXPORTS_DIR: &str = "exports";
pub const LOGS_DIR: &str = "logs";

/// Default home directory name under the user's home
pub const DEFAULT_HOME_DIR: &str = ".devnet";

//! Fixed names and built-in defaults for the resolver configuration

/// Directory under the user config dir holding plugpm settings
pub const CONFIG_DIR_NAME: &str = "plugpm";

pub const CONFIG_FILE_NAME: &str = "resolver.toml";

/// Depth guard for the backtracking strategy
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Search nodes the bundled solver may visit before settling for its best
/// solution so far
pub const DEFAULT_SOLVER_NODE_BUDGET: u64 = 1_000_000;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

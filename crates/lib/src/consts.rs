/// Application name, used for default directories and lock metadata.
pub const APP_NAME: &str = "toolsmith";

/// Environment variable overriding the default workspace root.
pub const ROOT_ENV: &str = "TOOLSMITH_ROOT";

/// Default configuration document name.
pub const DEFAULT_CONFIG: &str = "toolchain.toml";

/// Number of trailing tool output lines kept in error reports.
pub const TOOL_OUTPUT_TAIL_LINES: usize = 40;

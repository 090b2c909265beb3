//! Core configuration constants.
//!
//! Defaults shared by the invocation layer, the layout and the config loader.

use std::time::Duration;

/// Pause between consecutive writes on an outbound request stream. Gives an
/// interactive viewer time to watch a stream being fed.
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_millis(200);

/// Separator between accumulated elements of a streamed response.
pub const RESPONSE_SEPARATOR: &str = "\n";

/// Directory under the platform config dir holding rpcview settings.
pub const CONFIG_DIR_NAME: &str = "rpcview";

/// Settings file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Caption rendered under every contract header.
pub const CONTRACT_DESCRIPTION: &str = "Contains all mapped RPC methods";

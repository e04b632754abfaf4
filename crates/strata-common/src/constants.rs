//! System-wide constants and defaults.

/// Application name used in CLI output and synthesized documents.
pub const APP_NAME: &str = "strata";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "strata";

/// Default manifest file looked up by the CLI.
pub const DEFAULT_MANIFEST: &str = "strata.yaml";

/// Format version written into synthesized documents.
pub const SYNTHESIS_FORMAT_VERSION: u32 = 1;

/// CIDR matching every IPv4 address.
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Smallest subnet the network template will carve (/28).
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// Distance between consecutive network ACL rule numbers.
pub const DEFAULT_ACL_RULE_STEP: u32 = 5;

/// Highest rule number a network ACL accepts.
pub const MAX_ACL_RULE_NUMBER: u32 = 32_766;

/// First identifier handed out to instance-level filter rules.
pub const DEFAULT_GROUP_RULE_START: u32 = 1;

/// Ephemeral port range opened for return traffic through stateless filters.
pub const EPHEMERAL_PORTS: (u16, u16) = (1024, 65_535);

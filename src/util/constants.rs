//! Centralized constants for the compiler
//!
//! Reserved names, limits and timeouts in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Language
// ═══════════════════════════════════════════════════════════════

/// Reserved jump target that ends the workflow
pub const TERMINAL: &str = "END";

/// Directive sigil
pub const SIGIL: char = '@';

/// Opens and closes a verbatim code block
pub const FENCE: &str = "```";

/// Columns per tab stop when normalizing source text
pub const TAB_WIDTH: usize = 4;

/// Document format version written by the serializer
pub const FORMAT_VERSION: &str = "1.0";

// ═══════════════════════════════════════════════════════════════
// Limits
// ═══════════════════════════════════════════════════════════════

/// Default maximum source file size (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Upper bound on optimizer pass rounds before declaring a defect
pub const MAX_OPTIMIZE_ROUNDS: usize = 64;

/// File extension picked up by `flowc build`
pub const SOURCE_EXTENSION: &str = "flow";

// ═══════════════════════════════════════════════════════════════
// Augmentation Timeouts
// ═══════════════════════════════════════════════════════════════

/// Default timeout for one augmentation request
pub const AUGMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retry attempts for transient augmentation failures
pub const AUGMENT_MAX_RETRIES: u32 = 3;

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

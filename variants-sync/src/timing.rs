//! Named reaction windows.

use std::time::Duration;

/// Delay after a filesystem event before reconciling, so paired operations
/// (write-then-rename on editor save) settle first.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(100);

/// After a manifest-driven file rename, manifest key changes are ignored for
/// this long so the rename's own events do not re-trigger it.
pub const SUPPRESSION_WINDOW: Duration = Duration::from_millis(500);

/// Fallback used by in-page widget clients waiting for a push after a
/// command. Not used by the engine itself.
pub const UI_FALLBACK_WINDOW: Duration = Duration::from_millis(2500);

//! Shared defaults for the browser engine
//!
//! Values here mirror what a desktop Chrome reports so pages render their
//! regular (non-mobile, non-bot) markup.

/// Chrome user agent string presented by launched browsers
///
/// Update alongside the stable channel, roughly quarterly.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Default viewport, matches the most common desktop resolution for layout
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

/// Default per-navigation timeout in milliseconds
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default wait applied before click/fill/select interact with an element
pub const DEFAULT_INTERACTION_TIMEOUT_MS: u64 = 10_000;

/// Default timeout for explicit `wait_for_element` calls
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 20_000;

/// Default timeout for screenshot uploads
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 30_000;

/// Scroll deltas are clamped to this magnitude in either axis
pub const MAX_SCROLL_DELTA: i64 = 10_000;

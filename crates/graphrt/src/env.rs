use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

static GRAPHRT_HYBRID_DEBUG: OnceLock<bool> = OnceLock::new();
static GRAPHRT_DUMP_DIR: OnceLock<PathBuf> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// Initial debug flag for new hybrid backends.
pub(crate) fn hybrid_debug_enabled() -> bool {
    *GRAPHRT_HYBRID_DEBUG.get_or_init(|| match env::var("GRAPHRT_HYBRID_DEBUG") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

/// Directory receiving graph snapshots.
pub(crate) fn dump_dir() -> &'static PathBuf {
    GRAPHRT_DUMP_DIR.get_or_init(|| match env::var("GRAPHRT_DUMP_DIR") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => env::temp_dir().join("graphrt-dumps"),
    })
}

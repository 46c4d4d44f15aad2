use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Expand literal paths and glob patterns into the set of existing regular
/// files, deduplicated. Missing literals and patterns that match nothing are
/// skipped silently; a malformed pattern or an unreadable match is skipped
/// with a warning. Discovery never fails a cycle.
pub fn discover_files(patterns: &[String]) -> HashSet<PathBuf> {
    let mut files = HashSet::new();
    for pattern in patterns {
        let matches = match glob::glob(pattern) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(pattern = %pattern, "skipping malformed path pattern: {e}");
                continue;
            }
        };
        for entry in matches {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        files.insert(path);
                    } else {
                        debug!(path = %path.display(), "skipping non-regular file");
                    }
                }
                Err(e) => {
                    warn!(pattern = %pattern, "skipping unreadable match: {e}");
                }
            }
        }
    }
    files
}

//! Persistent browser profile directory handling.

use std::path::{Path, PathBuf};

use tracing::warn;

const DEFAULT_PROFILE_DIR_NAME: &str = "sports-checker-profile";

/// Default profile location under the system temp directory.
pub fn default_profile_dir() -> PathBuf {
	std::env::temp_dir().join(DEFAULT_PROFILE_DIR_NAME)
}

/// Resolves `dir` against the working directory and creates it if absent.
///
/// Returns `None` when the directory cannot be created; the browser then runs
/// on a throwaway profile and cookies do not survive a restart.
pub fn prepare_profile_dir(dir: &Path) -> Option<PathBuf> {
	let resolved = if dir.is_absolute() {
		dir.to_path_buf()
	} else {
		match std::env::current_dir() {
			Ok(cwd) => cwd.join(dir),
			Err(_) => dir.to_path_buf(),
		}
	};

	match std::fs::create_dir_all(&resolved) {
		Ok(()) => Some(resolved),
		Err(err) => {
			warn!(
				target = "slipcheck.profile",
				path = %resolved.display(),
				error = %err,
				"cannot create profile dir; running without persisted cookies"
			);
			None
		}
	}
}

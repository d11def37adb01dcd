//! Chromium-family executable discovery.
//!
//! Candidates are tried in order: branded Chrome first, then Chromium, then
//! Edge. The first one that exists (absolute paths) or resolves on `PATH`
//! (bare commands) wins.

use std::path::{Path, PathBuf};

use tracing::debug;

/// One place a browser may live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Candidate {
	/// Bare command name looked up on `PATH`.
	Command(&'static str),
	/// Absolute install location.
	Install(PathBuf),
}

impl Candidate {
	fn locate(&self) -> Option<PathBuf> {
		match self {
			Candidate::Command(name) => which::which(name).ok(),
			Candidate::Install(path) => path.exists().then(|| path.clone()),
		}
	}
}

/// Resolves the browser executable, preferring an explicit override.
///
/// An explicit path that neither exists nor resolves on `PATH` yields `None`;
/// discovery never silently replaces a configured browser.
pub fn resolve_browser_executable(explicit: Option<&Path>) -> Option<PathBuf> {
	match explicit {
		Some(path) if path.exists() => Some(path.to_path_buf()),
		Some(path) => which::which(path).ok(),
		None => find_chrome_executable(),
	}
}

/// Searches well-known install locations and `PATH` for the current platform.
pub fn find_chrome_executable() -> Option<PathBuf> {
	let found = candidates(std::env::consts::OS, |key| std::env::var(key).ok())
		.iter()
		.find_map(Candidate::locate);
	debug!(target = "slipcheck.browser", executable = ?found, "browser discovery");
	found
}

pub(crate) fn candidates(os: &str, env: impl Fn(&str) -> Option<String>) -> Vec<Candidate> {
	match os {
		"macos" => [
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
		]
		.into_iter()
		.map(|path| Candidate::Install(PathBuf::from(path)))
		.collect(),
		"windows" => windows_candidates(env),
		_ => {
			let mut list: Vec<Candidate> = ["google-chrome-stable", "google-chrome", "chromium-browser", "chromium"]
				.into_iter()
				.map(Candidate::Command)
				.collect();
			list.extend(
				[
					"/opt/google/chrome/chrome",
					"/usr/bin/google-chrome-stable",
					"/usr/bin/chromium-browser",
					"/usr/bin/chromium",
					"/snap/bin/chromium",
				]
				.into_iter()
				.map(|path| Candidate::Install(PathBuf::from(path))),
			);
			list.push(Candidate::Command("microsoft-edge"));
			list
		}
	}
}

fn windows_candidates(env: impl Fn(&str) -> Option<String>) -> Vec<Candidate> {
	let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
		.into_iter()
		.filter_map(|key| env(key).map(PathBuf::from))
		.collect();
	if roots.is_empty() {
		roots = vec![PathBuf::from(r"C:\Program Files"), PathBuf::from(r"C:\Program Files (x86)")];
	}

	let installs: [&[&str]; 3] = [
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Chromium", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
	];

	let mut list = Vec::new();
	for install in installs {
		for root in &roots {
			list.push(Candidate::Install(install.iter().fold(root.clone(), |path, part| path.join(part))));
		}
	}
	list.extend(["chrome.exe", "chromium.exe", "msedge.exe"].map(Candidate::Command));
	list
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn no_env(_: &str) -> Option<String> {
		None
	}

	#[test]
	fn linux_prefers_chrome_commands_and_ends_with_edge() {
		let list = candidates("linux", no_env);
		assert_eq!(list.first(), Some(&Candidate::Command("google-chrome-stable")));
		assert_eq!(list.last(), Some(&Candidate::Command("microsoft-edge")));
		assert!(list.contains(&Candidate::Install(PathBuf::from("/opt/google/chrome/chrome"))));
	}

	#[test]
	fn windows_tries_chrome_under_every_root_before_edge() {
		let env = |key: &str| match key {
			"PROGRAMFILES" => Some(r"D:\Apps".to_string()),
			"LOCALAPPDATA" => Some(r"D:\Users\me\AppData\Local".to_string()),
			_ => None,
		};
		let list = candidates("windows", env);
		let chrome = |root: &str| Candidate::Install(PathBuf::from(root).join("Google").join("Chrome").join("Application").join("chrome.exe"));
		assert_eq!(list[0], chrome(r"D:\Apps"));
		assert_eq!(list[1], chrome(r"D:\Users\me\AppData\Local"));
		assert_eq!(list.last(), Some(&Candidate::Command("msedge.exe")));
	}

	#[test]
	fn windows_falls_back_to_default_program_files() {
		let list = candidates("windows", no_env);
		assert!(matches!(&list[0], Candidate::Install(path) if path.starts_with(r"C:\Program Files")));
	}

	#[test]
	fn missing_install_is_skipped() {
		assert_eq!(Candidate::Install(PathBuf::from("/definitely/missing/chrome")).locate(), None);
	}

	#[test]
	fn explicit_existing_path_wins() {
		let temp = TempDir::new().unwrap();
		let fake = temp.path().join("my-chrome");
		std::fs::write(&fake, b"").unwrap();
		assert_eq!(resolve_browser_executable(Some(&fake)), Some(fake));
	}

	#[test]
	fn explicit_missing_path_is_not_replaced_by_discovery() {
		let missing = Path::new("/definitely/missing/chrome-binary");
		assert_eq!(resolve_browser_executable(Some(missing)), None);
	}
}

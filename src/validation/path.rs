//! Remote path model
//!
//! Paths on the SD card are plain `/`-separated strings. The card is
//! FAT-formatted, so names compare case-insensitively while the on-device
//! casing is what every command must carry.

/// Roots that must never receive directories or files
pub const PROTECTED_ROOTS: &[&str] =
	&["/", "/sd2snes", "/saves", "/system", "/firmware", "/boot", "/kernel"];

/// Canonical form of a remote path
///
/// Backslashes become slashes, runs of slashes collapse to one and a single
/// leading slash is ensured. Empty input stays empty. Idempotent.
pub fn normalize(path: &str) -> String {
	if path.is_empty() {
		return String::new();
	}
	let mut out = String::with_capacity(path.len() + 1);
	out.push('/');
	for c in path.chars() {
		let c = if c == '\\' { '/' } else { c };
		if c == '/' && out.ends_with('/') {
			continue;
		}
		out.push(c);
	}
	out
}

/// Join a child name onto a remote directory
pub fn join(dir: &str, name: &str) -> String {
	normalize(&format!("{}/{}", dir, name))
}

/// Parent directory of a remote path; the root is its own parent
pub fn parent(path: &str) -> String {
	let path = normalize(path);
	let trimmed = path.trim_end_matches('/');
	match trimmed.rfind('/') {
		Some(0) | None => "/".to_string(),
		Some(idx) => trimmed[..idx].to_string(),
	}
}

/// Last component of a remote path
pub fn file_name(path: &str) -> &str {
	path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Components of a remote path, without empty segments
pub fn components(path: &str) -> Vec<&str> {
	path.split(|c| c == '/' || c == '\\').filter(|s| !s.is_empty()).collect()
}

/// Find the candidate equal to `target` ignoring case, keeping its casing
pub fn match_case_insensitive<'a, S>(target: &str, candidates: &'a [S]) -> Option<&'a str>
where
	S: AsRef<str>,
{
	let wanted = target.to_lowercase();
	for candidate in candidates {
		let candidate: &'a str = candidate.as_ref();
		if candidate.to_lowercase() == wanted {
			return Some(candidate);
		}
	}
	None
}

/// Whether creating or placing anything at `path` is allowed
///
/// The bare root is refused; the other protected roots are refused along
/// with everything nested under them.
pub fn is_safe(path: &str) -> bool {
	let normalized = normalize(path).to_lowercase();
	let normalized = match normalized.trim_end_matches('/') {
		"" => "/",
		trimmed => trimmed,
	};
	!PROTECTED_ROOTS.iter().any(|root| {
		if *root == "/" {
			normalized == "/"
		} else {
			normalized == *root
				|| normalized.strip_prefix(*root).map_or(false, |rest| rest.starts_with('/'))
		}
	})
}


// vim: ts=4

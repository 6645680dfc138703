#![allow(missing_docs)]

use std::process::Command;

/// Abbreviated hash of the checked out commit, if built from a git tree.
fn head_commit() -> Option<String> {
	let out = Command::new("git")
		.args(["rev-parse", "--short=8", "HEAD"])
		.output()
		.ok()?;
	if !out.status.success() {
		return None;
	}

	let sha = String::from_utf8(out.stdout).ok()?;
	Some(sha.trim().to_owned()).filter(|sha| !sha.is_empty())
}

fn main() {
	let sha = head_commit().unwrap_or_else(|| String::from("unknown"));

	println!("cargo:rustc-env=GIT_SHA={sha}");
	println!("cargo:rerun-if-changed=../.git/HEAD");
	println!("cargo:rerun-if-changed=../.git/refs/heads");
}

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");

    // Embedded so `rawpreview --version` can tell a tagged release apart
    // from a dev build. Both are empty/false when built outside a git
    // checkout (e.g. from a crates.io tarball).
    let commit = git(&["rev-parse", "--short=10", "HEAD"]).unwrap_or_default();
    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=RAWPREVIEW_COMMIT={commit}");
    println!("cargo:rustc-env=RAWPREVIEW_RELEASE={on_tag}");
}

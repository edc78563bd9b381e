//! Build script: embeds the version string as `ANTLER_VERSION`.

use std::process::Command;

fn main() {
    // Prefer ANTLER_VERSION if set (release builds), otherwise ask git.
    if let Ok(version) = std::env::var("ANTLER_VERSION") {
        println!("cargo:rustc-env=ANTLER_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=ANTLER_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=ANTLER_VERSION");
}

// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

use std::process::Command;

fn main() {
    // use `git describe` when building from a checkout, the crate version otherwise
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string());
    let git_version = Command::new("git")
        .args(&["describe", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());
    let version = match git_version {
        Some(g) if !g.is_empty() => format!("{}-{}", pkg_version, g),
        _ => pkg_version,
    };
    println!("cargo:rustc-env=VERSION_STRING={}", version);
    println!("cargo:rerun-if-changed=build.rs");
}

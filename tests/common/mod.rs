//! Shared helpers for flourish integration tests.
//!
//! Tests build small trees in a temporary directory and drive them either
//! through the library API or through the `flourish` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temp dir plus its canonical path, so comparisons with handle paths hold
/// on systems where the temp dir sits behind a symlink.
pub fn workspace() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    (temp, root)
}

/// Writes a binary PGM whose pixel at (x, y) is `(x + y) % 256`.
#[allow(unused)]
pub fn write_pgm(path: &Path, width: u32, height: u32) {
    let mut data = format!("P5\n{width} {height}\n255\n").into_bytes();
    for y in 0..height {
        for x in 0..width {
            data.push(((x + y) % 256) as u8);
        }
    }
    fs::write(path, data).unwrap();
}

/// Width and height from a netpbm header.
#[allow(unused)]
pub fn pnm_size(path: &Path) -> (u32, u32) {
    let data = fs::read(path).unwrap();
    let text = String::from_utf8_lossy(&data[..data.len().min(64)]).into_owned();
    let mut fields = text.split_ascii_whitespace().skip(1);
    let width = fields.next().unwrap().parse().unwrap();
    let height = fields.next().unwrap().parse().unwrap();
    (width, height)
}

/// Runs the `flourish` binary inside `root`.
#[allow(unused)]
pub fn run_cli(root: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("flourish");
    cmd.args(args).current_dir(root).env("NO_COLOR", "1");
    cmd.assert()
}

//! Running an example and checking its UART output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::build::build_example;
use crate::qemu::run_qemu;

/// Options for running an example.
pub struct RunOptions {
    /// Print the semihosting console and UART output (for `qemu` command).
    pub verbose: bool,
    /// Update expected files instead of comparing (for `test --bless`).
    pub bless: bool,
    /// Build in release mode.
    pub release: bool,
}

/// Shows bytes as text, with the CR of every CRLF made visible.
fn visible(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace("\r\n", "\\r\n")
}

/// Run an example with the given options.
///
/// Returns `Ok(true)` if the test passed, `Ok(false)` if it failed.
pub fn run_example(root: &Path, example: &str, opts: &RunOptions) -> Result<bool> {
    println!("Building '{example}'...");
    let elf_path = build_example(root, example, opts.release)?;

    println!("Running in QEMU...");
    let output = run_qemu(&elf_path)?;

    if opts.verbose {
        print!("{}", String::from_utf8_lossy(&output.semihosting));
        println!("--- uart0 ---");
        print!("{}", visible(&output.uart0));
        println!("--- QEMU run end ---");
        return Ok(true);
    }

    let expected_path = root
        .join("testsuite")
        .join("expected")
        .join(format!("{example}.expected"));

    if opts.bless {
        let status = if expected_path.exists() {
            let existing = fs::read(&expected_path)?;
            if existing == output.uart0 {
                "No change"
            } else {
                fs::write(&expected_path, &output.uart0)?;
                "Updated"
            }
        } else {
            let dir = expected_path
                .parent()
                .context("Expected file has no parent directory")?;
            fs::create_dir_all(dir)?;
            fs::write(&expected_path, &output.uart0)?;
            "Created"
        };
        println!("  {example}.expected: {status}");
        Ok(true)
    } else if expected_path.exists() {
        let expected = fs::read(&expected_path)?;
        if output.uart0 == expected {
            println!("  PASS");
            Ok(true)
        } else {
            println!("  FAIL: UART output differs from expected");
            println!("--- expected ---");
            print!("{}", visible(&expected));
            println!("--- uart0 ---");
            print!("{}", visible(&output.uart0));
            Ok(false)
        }
    } else {
        println!("  No expected output file, run with --bless to create");
        println!("--- uart0 ---");
        print!("{}", visible(&output.uart0));
        Ok(false)
    }
}

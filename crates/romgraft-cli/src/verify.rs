//! `romgraft verify` command implementation

use anyhow::{Context, Result};
use romgraft_uefi::{walk_chain, UcodeFile};
use std::fs;
use std::path::Path;

pub fn run(ucode: &Path) -> Result<()> {
    println!("Verifying microcode file...");
    println!("  File: {}", ucode.display());

    let data = fs::read(ucode).context("Failed to read microcode file")?;
    println!("  Size: {} bytes", data.len());

    let file = UcodeFile::parse(&data).context("Microcode does not validate")?;

    println!();
    println!("Checksum: VALID");
    println!("  Revision:  {:#010x}", file.header.update_revision);
    println!("  CPU:       {:#010x}", file.header.processor_signature);
    println!("  Platforms: {:#04x}", file.header.platform_ids);
    println!(
        "  Date:      {:04x}-{:02x}-{:02x}",
        file.header.year, file.header.month, file.header.day
    );
    println!("  Data size: {} bytes", file.header.data_size);
    println!("  Total:     {} bytes", file.header.total_size);

    let chain = walk_chain(&data);
    if chain.updates.len() > 1 {
        println!();
        println!("Concatenated updates: {}", chain.updates.len());
        for entry in &chain.updates {
            println!(
                "  {:#010x}: revision {:#010x}, cpu {:#010x}, {} bytes",
                entry.offset,
                entry.header.update_revision,
                entry.header.processor_signature,
                entry.header.total_size,
            );
        }
    }
    if chain.trailing != 0 {
        println!();
        println!(
            "Note: {:#x} trailing bytes after the update chain",
            chain.trailing
        );
    }

    println!();
    println!("Verification: PASSED");

    Ok(())
}

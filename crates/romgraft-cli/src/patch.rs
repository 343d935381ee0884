//! `romgraft patch` command implementation

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use romgraft_uefi::{ChainReport, Guid, MicrocodePatcher, PatchError, PatchReport, RecordOutcome};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub fn run(image: &Path, ucode: &Path, output: &Path, guid: Option<Guid>) -> Result<()> {
    println!("Grafting microcode...");
    println!("  Image:  {}", image.display());
    println!("  Ucode:  {}", ucode.display());
    println!("  Output: {}", output.display());

    let rom_data = fs::read(image).context("Failed to read firmware image")?;
    let ucode_data = fs::read(ucode).context("Failed to read microcode file")?;
    println!("  Size:   {} bytes", rom_data.len());

    let patcher = match guid {
        Some(guid) => MicrocodePatcher::with_guid(guid),
        None => MicrocodePatcher::new(),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Scanning image...");

    let result = patcher.apply(&rom_data, &ucode_data);
    spinner.finish_and_clear();

    let (patched, report) = match result {
        Ok(ok) => ok,
        Err(PatchError::NoChange { report }) => {
            print_records(&report);
            anyhow::bail!("No record was patched; not writing an output image");
        }
        Err(e) => return Err(e).context("Patch failed"),
    };

    print_replacement(&report.replacement, report.replacement_len);
    print_records(&report);

    fs::write(output, &patched).context("Failed to write output image")?;

    println!();
    println!(
        "Patched {} record(s), {} body bytes rewritten",
        report.records_patched, report.bytes_filled
    );
    println!("  Input SHA256:  {}", hex::encode(Sha256::digest(&rom_data)));
    println!("  Output SHA256: {}", hex::encode(Sha256::digest(&patched)));
    println!("Wrote {} bytes to {}", patched.len(), output.display());

    Ok(())
}

/// Print the update chain found inside the replacement file
fn print_replacement(chain: &ChainReport, len: usize) {
    println!();
    println!("Replacement update ({} bytes):", len);
    for entry in &chain.updates {
        println!(
            "  {:#010x}: revision {:#010x}, cpu {:#010x}, platforms {:#04x}, {} bytes",
            entry.offset,
            entry.header.update_revision,
            entry.header.processor_signature,
            entry.header.platform_ids,
            entry.header.total_size,
        );
    }
    if chain.trailing != 0 {
        println!(
            "  Note: {:#x} trailing bytes after the update chain",
            chain.trailing
        );
    }
}

/// Print one line per GUID hit
fn print_records(report: &PatchReport) {
    println!();
    if report.records.is_empty() {
        println!("No occurrence of the file GUID found");
        return;
    }

    for record in &report.records {
        match &record.outcome {
            RecordOutcome::Patched {
                file_type,
                body_len,
                previous,
            } => {
                println!(
                    "{:#010x}: patched (type {:#04x}, body {} bytes)",
                    record.offset, file_type, body_len
                );
                if previous.is_empty() {
                    println!("  No microcode was present in the old body");
                } else {
                    println!(
                        "  Replaced {} update(s) covering {} bytes",
                        previous.updates.len(),
                        previous.consumed
                    );
                }
            }
            RecordOutcome::BodyTooSmall {
                content_len,
                body_len,
            } => {
                println!(
                    "{:#010x}: skipped, body too small ({} < {})",
                    record.offset, body_len, content_len
                );
            }
            RecordOutcome::Skipped { reason } => {
                println!("{:#010x}: skipped, {}", record.offset, reason);
            }
        }
    }
}

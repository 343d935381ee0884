//! `romgraft info` command implementation

use anyhow::{Context, Result};
use romgraft_uefi::{Guid, MicrocodePatcher, RecordStatus};
use std::fs;
use std::path::Path;

pub fn run(image: &Path, guid: Option<Guid>, json: bool) -> Result<()> {
    let rom_data = fs::read(image).context("Failed to read firmware image")?;

    let patcher = match guid {
        Some(guid) => MicrocodePatcher::with_guid(guid),
        None => MicrocodePatcher::new(),
    };
    let report = patcher.scan(&rom_data);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode report")?
        );
        return Ok(());
    }

    println!("Image: {} ({} bytes)", image.display(), report.image_len);
    println!("Records found: {}", report.records.len());

    for record in &report.records {
        println!();
        match &record.status {
            RecordStatus::Valid {
                header,
                body_len,
                microcode,
            } => {
                println!("{:#010x}: {}", record.offset, header.guid);
                println!(
                    "  Type {:#04x}, attributes {:#04x}, state {:#04x}, body {} bytes",
                    header.file_type, header.attributes, header.state, body_len
                );
                if microcode.is_empty() {
                    println!("  No microcode found in the body");
                }
                for entry in &microcode.updates {
                    println!(
                        "  {:#010x}: revision {:#010x}, cpu {:#010x}, date {:04x}-{:02x}-{:02x}, {} bytes",
                        entry.offset,
                        entry.header.update_revision,
                        entry.header.processor_signature,
                        entry.header.year,
                        entry.header.month,
                        entry.header.day,
                        entry.header.total_size,
                    );
                }
                if microcode.trailing != 0 {
                    println!(
                        "  Note: {:#x} trailing bytes after the update chain",
                        microcode.trailing
                    );
                }
            }
            RecordStatus::Invalid { reason } => {
                println!("{:#010x}: invalid record, {}", record.offset, reason);
            }
        }
    }

    Ok(())
}

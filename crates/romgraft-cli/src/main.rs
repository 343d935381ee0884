//! Romgraft CLI - microcode grafting for UEFI firmware images

mod info;
mod patch;
mod verify;

use clap::{Parser, Subcommand};
use romgraft_uefi::Guid;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "romgraft")]
#[command(version, about = "Replace Intel microcode inside UEFI firmware images")]
#[command(
    long_about = "Romgraft finds the FFS files that carry CPU microcode in a raw UEFI image, \
validates them, and grafts a replacement update into each one in place, preserving the image \
size.\n\nCorrupt records are reported and skipped; a run that changes nothing writes nothing."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Graft a replacement microcode update into an image
    Patch {
        /// Input firmware image
        image: PathBuf,

        /// Raw binary microcode update to graft in
        ucode: PathBuf,

        /// Output image path (written only on success)
        #[arg(short, long)]
        output: PathBuf,

        /// FFS file GUID to search for instead of the microcode GUID
        #[arg(long)]
        guid: Option<Guid>,
    },

    /// Scan an image and report microcode records without modifying it
    Info {
        /// Firmware image
        image: PathBuf,

        /// FFS file GUID to search for instead of the microcode GUID
        #[arg(long)]
        guid: Option<Guid>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a standalone microcode file and print its update chain
    Verify {
        /// Raw binary microcode file
        ucode: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Patch {
            image,
            ucode,
            output,
            guid,
        } => patch::run(&image, &ucode, &output, guid),

        Commands::Info { image, guid, json } => info::run(&image, guid, json),

        Commands::Verify { ucode } => verify::run(&ucode),
    }
}

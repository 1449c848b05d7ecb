use std::path::PathBuf;

use clap::{Parser, Subcommand};
use squish::Scheme;

mod commands;

#[derive(Parser)]
#[command(version, about = "Compress single files with Huffman coding or run-length encoding")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress FILE into a .huff or .rle archive next to it
    Compress {
        file: PathBuf,
        /// Compression scheme: huffman or rle
        #[arg(short, long, default_value = "huffman")]
        scheme: Scheme,
        /// Write the archive here instead
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replace the output if it already exists
        #[arg(short, long)]
        force: bool,
        /// Report progress on stderr
        #[arg(long)]
        progress: bool,
    },
    /// Restore the original file from ARCHIVE
    Decompress {
        archive: PathBuf,
        /// Write the restored file here instead
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replace the output if it already exists
        #[arg(short, long)]
        force: bool,
        /// Report progress on stderr
        #[arg(long)]
        progress: bool,
    },
    /// Print the header of ARCHIVE
    Inspect {
        archive: PathBuf,
        /// Also list the Huffman code table
        #[arg(long)]
        codes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match Cli::parse().command {
        Command::Compress {
            file,
            scheme,
            output,
            force,
            progress,
        } => commands::compress(&file, scheme, output, force, progress),
        Command::Decompress {
            archive,
            output,
            force,
            progress,
        } => commands::decompress(&archive, output, force, progress),
        Command::Inspect { archive, codes } => commands::inspect(&archive, codes),
    }
}

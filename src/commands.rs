use std::{
    io::{stderr, Write},
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context};
use squish::{Options, Progress, Scheme};

fn progress_bar(label: &'static str) -> impl FnMut(f32) {
    move |fraction| {
        eprint!("\r{label}: {:>3.0}%", fraction * 100.0);
        if fraction >= 1.0 {
            eprintln!();
        }
        let _ = stderr().flush();
    }
}

pub fn compress(
    file: &Path,
    scheme: Scheme,
    output: Option<PathBuf>,
    force: bool,
    show_progress: bool,
) -> anyhow::Result<()> {
    ensure!(file.is_file(), "{file:?} is not a regular file");
    let options = Options {
        output,
        overwrite: force,
    };
    let mut bar = progress_bar("compressing");
    let mut progress = if show_progress {
        Progress::new(&mut bar)
    } else {
        Progress::silent()
    };
    let archive = squish::compress_with(file, scheme, &options, &mut progress)
        .context(format!("compressing {file:?} with {scheme}"))?;

    let original_len = std::fs::metadata(file)
        .context(format!("reading metadata of {file:?}"))?
        .len();
    let archive_len = std::fs::metadata(&archive)
        .context(format!("reading metadata of {archive:?}"))?
        .len();
    println!(
        "{} -> {} ({original_len} -> {archive_len} bytes)",
        file.display(),
        archive.display()
    );
    Ok(())
}

pub fn decompress(
    archive: &Path,
    output: Option<PathBuf>,
    force: bool,
    show_progress: bool,
) -> anyhow::Result<()> {
    let options = Options {
        output,
        overwrite: force,
    };
    let mut bar = progress_bar("decompressing");
    let mut progress = if show_progress {
        Progress::new(&mut bar)
    } else {
        Progress::silent()
    };
    let restored = squish::decompress_with(archive, &options, &mut progress)
        .context(format!("decompressing {archive:?}"))?;
    println!("{} -> {}", archive.display(), restored.display());
    Ok(())
}

pub fn inspect(archive: &Path, show_codes: bool) -> anyhow::Result<()> {
    let info = squish::inspect(archive).context(format!("reading header of {archive:?}"))?;
    println!("{info}");
    if show_codes {
        if let Some(codes) = info.header.codes() {
            for (byte, code) in codes.iter() {
                let printable = if byte.is_ascii_graphic() {
                    format!("{:?}", byte as char)
                } else {
                    String::from("   ")
                };
                let code = if code.is_empty() {
                    String::from("(empty)")
                } else {
                    code.to_string()
                };
                println!("{byte:#04x} {printable} {code}");
            }
        }
    }
    Ok(())
}

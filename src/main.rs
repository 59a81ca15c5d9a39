use clap::{Parser, Subcommand};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use bindle::archive::Archive;
use bindle::codec::CompressionRequest;

#[derive(Parser)]
#[command(name = "bindle", version = "1.0.0", about = "The Bindle single-file archive CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents
    List { file: PathBuf },
    /// Print one entry's bytes to stdout
    Cat { file: PathBuf, name: String },
    /// Add a single file's contents under `name`, compressed with Zstd
    Add { file: PathBuf, name: String, src: PathBuf },
    /// Recursively pack a directory into the archive
    Pack { file: PathBuf, src_dir: PathBuf },
    /// Extract every entry into a directory
    Unpack { file: PathBuf, dest_dir: PathBuf },
    /// Compact the archive, reclaiming space from shadowed/removed entries
    Vacuum { file: PathBuf },
}

/// Reject an entry name that could escape `dest_dir` on extraction —
/// absolute paths or any `..` component.
fn is_safe_entry_name(name: &str) -> bool {
    let path = Path::new(name);
    if path.is_absolute() {
        return false;
    }
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::List { file } => {
            let ar = Archive::open(&file)?;
            for i in 0..ar.length() {
                let name = ar.entry_name(i as usize).unwrap_or("?");
                println!("{name}");
            }
        }

        Commands::Cat { file, name } => {
            let mut ar = Archive::open(&file)?;
            let data = ar.read(&name)?;
            std::io::Write::write_all(&mut std::io::stdout(), &data)?;
        }

        Commands::Add { file, name, src } => {
            let mut ar = Archive::open(&file)?;
            let data = std::fs::read(&src)?;
            ar.add(&name, &data, CompressionRequest::Auto)?;
            ar.save()?;
            println!("added {name} ({} B)", data.len());
        }

        Commands::Pack { file, src_dir } => {
            let mut ar = Archive::open(&file)?;
            let mut count = 0usize;
            for entry in WalkDir::new(&src_dir).follow_links(false) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry.path().strip_prefix(&src_dir).unwrap_or(entry.path());
                let name = rel.to_string_lossy().replace('\\', "/");
                let data = std::fs::read(entry.path())?;
                ar.add(&name, &data, CompressionRequest::Auto)?;
                println!("  packed  {name} ({} B)", data.len());
                count += 1;
            }
            ar.save()?;
            println!("Packed {count} file(s) into {}", file.display());
        }

        Commands::Unpack { file, dest_dir } => {
            let mut ar = Archive::open(&file)?;
            std::fs::create_dir_all(&dest_dir)?;
            let names: Vec<String> = (0..ar.length())
                .map(|i| ar.entry_name(i as usize).unwrap_or("?").to_string())
                .collect();
            for name in names {
                if !is_safe_entry_name(&name) {
                    eprintln!("skipping entry with unsafe path: {name}");
                    continue;
                }
                let data = ar.read(&name)?;
                let dest = dest_dir.join(&name);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&dest, &data)?;
            }
            println!("Unpacked to: {}", dest_dir.display());
        }

        Commands::Vacuum { file } => {
            let mut ar = Archive::open(&file)?;
            let before = std::fs::metadata(&file)?.len();
            ar.vacuum()?;
            let after = std::fs::metadata(&file)?.len();
            println!("Vacuumed {}: {} B -> {} B", file.display(), before, after);
        }
    }

    Ok(())
}

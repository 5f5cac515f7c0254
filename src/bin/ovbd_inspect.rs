use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ovbd::config::ReaderConfig;
use ovbd::error::{OvbdError, Result};
use ovbd::{Image, Layer};

const EXIT_OK: i32 = 0;
const EXIT_PARTIAL_READ: i32 = 10;
const EXIT_FATAL_ERROR: i32 = 20;

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormatArg {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "ovbd-inspect", about = "Inspect overlay virtual block device images")]
struct Cli {
    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormatArg,

    /// Sector size of the virtual disk in bytes
    #[arg(long, default_value_t = 512, global = true)]
    sector_size: u32,

    /// Do not take a shared lock on the image file
    #[arg(long, global = true)]
    no_lock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the image headers
    Info {
        /// Path to the image file
        image: PathBuf,
    },
    /// List segment mappings
    Index {
        /// Path to the image file
        image: PathBuf,

        /// Stop after this many mappings
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Copy a byte range of the virtual disk to stdout or a file
    Read {
        /// Path to the image file
        image: PathBuf,

        /// Byte offset (sector aligned)
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Number of bytes (sector aligned)
        #[arg(long)]
        length: u64,

        /// Write to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_image(cli: &Cli, path: &Path) -> Result<Image> {
    let config = ReaderConfig::default()
        .sector_size(cli.sector_size)
        .lock_backing(!cli.no_lock);
    Image::open_with_config(path, &config)
}

fn info_json(image: &Image) -> serde_json::Value {
    let vf = image.virtual_file();
    let ht = vf.header();
    let mut report = json!({
        "path": image.path().display().to_string(),
        "compressed": image.is_compressed(),
        "virtual_size": vf.virtual_size(),
        "lsmt": {
            "index_offset": ht.index_offset,
            "index_size": ht.index_size,
            "live_segments": vf.index().len(),
            "flags": ht.flags.bits(),
            "sealed": ht.flags.is_sealed(),
        },
    });
    if let Layer::Compressed(zf) = vf.backing() {
        let zh = zf.header();
        let algorithm = zh
            .opt
            .compression()
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|_| format!("unknown({})", zh.opt.algorithm));
        report["zfile"] = json!({
            "vsize": zh.vsize,
            "blocks": zf.jump_table().block_count(),
            "block_size": zh.opt.block_size,
            "algorithm": algorithm,
            "level": zh.opt.level,
            "verify": zh.opt.verify,
            "dict_size": zh.opt.dict_len(),
            "compressed_bytes": zf.jump_table().data_end() - zf.jump_table().data_start(),
        });
    }
    report
}

fn print_info_text(report: &serde_json::Value) {
    println!("path:           {}", report["path"].as_str().unwrap_or_default());
    println!("virtual size:   {}", report["virtual_size"]);
    println!("compressed:     {}", report["compressed"]);
    let lsmt = &report["lsmt"];
    println!(
        "lsmt index:     {} live of {} entries at offset {}",
        lsmt["live_segments"], lsmt["index_size"], lsmt["index_offset"]
    );
    println!("lsmt flags:     {:#x}", lsmt["flags"].as_u64().unwrap_or(0));
    if let Some(zfile) = report.get("zfile") {
        println!(
            "zfile:          {} blocks of {} bytes, {} (level {})",
            zfile["blocks"],
            zfile["block_size"],
            zfile["algorithm"].as_str().unwrap_or_default(),
            zfile["level"]
        );
        println!(
            "zfile data:     {} compressed bytes for {} bytes",
            zfile["compressed_bytes"], zfile["vsize"]
        );
        println!(
            "zfile verify:   {}  dict: {} bytes",
            zfile["verify"], zfile["dict_size"]
        );
    }
}

fn run_index(cli: &Cli, image: &Image, limit: Option<usize>) {
    let index = image.virtual_file().index();
    let limit = limit.unwrap_or(usize::MAX);
    match cli.format {
        OutputFormatArg::Json => {
            let entries: Vec<_> = index
                .iter()
                .take(limit)
                .map(|m| {
                    let moffset = (!m.zeroed).then_some(m.moffset);
                    json!({
                        "offset": m.offset,
                        "length": m.length,
                        "moffset": moffset,
                        "zeroed": m.zeroed,
                    })
                })
                .collect();
            println!("{}", json!({ "count": index.len(), "mappings": entries }));
        }
        OutputFormatArg::Text => {
            println!("{:>16} {:>8} {:>16}", "offset", "length", "moffset");
            for m in index.iter().take(limit) {
                if m.zeroed {
                    println!("{:>16} {:>8} {:>16}", m.offset, m.length, "zero");
                } else {
                    println!("{:>16} {:>8} {:>16}", m.offset, m.length, m.moffset);
                }
            }
            let mapped: u64 = index.iter().map(|m| m.length as u64).sum();
            println!("{} mappings, {} sectors mapped", index.len(), mapped);
        }
    }
}

fn run_read(image: &Image, offset: u64, length: u64, output: Option<&Path>) -> Result<i32> {
    let mut buf = vec![0u8; length as usize];
    let (n, code) = match image.read(&mut buf, offset) {
        Ok(n) => (n, EXIT_OK),
        Err(e @ OvbdError::Partial { .. }) => {
            eprintln!("ERROR: {}", e);
            (e.produced(), EXIT_PARTIAL_READ)
        }
        Err(e) => return Err(e),
    };

    match output {
        Some(path) => File::create(path)?.write_all(&buf[..n])?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&buf[..n])?;
            stdout.flush()?;
        }
    }
    Ok(code)
}

fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Command::Info { image } => {
            let image = open_image(cli, image)?;
            let report = info_json(&image);
            match cli.format {
                OutputFormatArg::Json => println!("{}", report),
                OutputFormatArg::Text => print_info_text(&report),
            }
            Ok(EXIT_OK)
        }
        Command::Index { image, limit } => {
            let image = open_image(cli, image)?;
            run_index(cli, &image, *limit);
            Ok(EXIT_OK)
        }
        Command::Read {
            image,
            offset,
            length,
            output,
        } => {
            let image = open_image(cli, image)?;
            run_read(&image, *offset, *length, output.as_deref())
        }
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            match cli.format {
                OutputFormatArg::Json => {
                    println!("{}", json!({ "status": "fatal", "error": e.to_string() }))
                }
                OutputFormatArg::Text => eprintln!("ERROR: {}", e),
            }
            EXIT_FATAL_ERROR
        }
    };
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read() {
        let cli = Cli::try_parse_from([
            "ovbd-inspect",
            "read",
            "disk.img",
            "--offset",
            "4096",
            "--length",
            "512",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormatArg::Json));
        match cli.command {
            Command::Read { offset, length, .. } => {
                assert_eq!(offset, 4096);
                assert_eq!(length, 512);
            }
            _ => panic!("expected read"),
        }
    }
}

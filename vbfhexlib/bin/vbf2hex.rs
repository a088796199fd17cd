use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use vbfhexlib::{AddressPolicy, ConvertOptions, LineEnding, VbfFile, VbfMetadata};

/// VBF to Intel HEX converter
#[derive(Parser, Debug)]
#[command(name = "vbf2hex", version, about)]
struct Cli {
    /// Print debug logs (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the header metadata and data layout of a VBF file
    Info {
        /// Input VBF file
        input: PathBuf,
    },
    /// Convert a VBF file into an Intel HEX file
    Convert {
        /// Input VBF file
        input: PathBuf,
        /// Output HEX file (defaults to the input path with a `.hex` extension)
        output: Option<PathBuf>,
        /// Address policy of the output records
        #[arg(long, value_enum)]
        policy: PolicyArg,
        /// Maximum data bytes per record (1..=32)
        #[arg(long, default_value_t = vbfhexlib::MAX_RECORD_PAYLOAD)]
        record_size: u8,
        /// Terminate lines with CRLF instead of LF
        #[arg(long)]
        crlf: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    /// Extended Linear Address records on 64 KB boundaries
    Segmented,
    /// 16-bit record addresses only, no Extended Linear Address records
    Direct,
}

impl From<PolicyArg> for AddressPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Segmented => Self::Segmented,
            PolicyArg::Direct => Self::Direct,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match cli.command {
        Command::Info { input } => run_info(&input),
        Command::Convert {
            input,
            output,
            policy,
            record_size,
            crlf,
        } => {
            let mut options = ConvertOptions::new(policy.into());
            options.set_max_payload_size(record_size)?;
            if crlf {
                options.set_line_ending(LineEnding::CrLf);
            }
            let output = output.unwrap_or_else(|| input.with_extension("hex"));
            run_convert(&input, &output, &options)
        }
    }
}

fn run_info(path: &Path) -> Result<()> {
    fn format_addr(addr: u64) -> String {
        let s = format!("{addr:08X}");
        format!("0x{}_{}", &s[..s.len() - 4], &s[s.len() - 4..])
    }

    fn show<T: std::fmt::Display>(label: &str, value: Option<T>) {
        match value {
            Some(v) => println!("{label:<26}{v}"),
            None => println!("{label:<26}-"),
        }
    }

    // Metadata never depends on the binary region
    let md: VbfMetadata = vbfhexlib::inspect(path)
        .with_context(|| format!("Failed to read header of {}", path.display()))?;

    println!("File Path:                {}", path.display());
    show("Version:", md.version);
    show("Software Part Number:", md.sw_part_number);
    show("Software Part Type:", md.sw_part_type);
    show("Network:", md.network);
    show("Frame Format:", md.frame_format);
    show("ECU Address:", md.ecu_address.map(|a| format!("0x{a:X}")));
    show(
        "Data Format Identifier:",
        md.data_format_identifier.map(|a| format!("0x{a:02X}")),
    );
    show(
        "Verification Block Start:",
        md.verification_block_start
            .map(|a| format_addr(u64::from(a))),
    );
    show("File Checksum:", md.file_checksum.map(|a| format!("0x{a:08X}")));
    if let Some(erase) = md.erase {
        for range in erase {
            println!(
                "Erase:                    {} - {}",
                format_addr(u64::from(range.start)),
                format_addr(u64::from(range.end))
            );
        }
    }
    if let Some(description) = md.description {
        println!("Description:");
        for line in description.lines() {
            println!("    {line}");
        }
    }

    let vbf = VbfFile::from_vbf(path)?;
    println!("Blocks:                   {}", vbf.blocks.len());
    println!("Data Size:                {} bytes", vbf.data_size());
    for block in &vbf.blocks {
        println!(
            "    {} - {} ({} bytes)",
            format_addr(u64::from(block.address)),
            format_addr(block.end_address().saturating_sub(1)),
            block.len()
        );
    }
    Ok(())
}

fn run_convert(in_path: &Path, out_path: &Path, options: &ConvertOptions) -> Result<()> {
    let stats = vbfhexlib::convert(in_path, out_path, options).with_context(|| {
        format!(
            "Failed to convert {} -> {}",
            in_path.display(),
            out_path.display()
        )
    })?;

    println!(
        "Converted {} -> {} ({} blocks, {} bytes, {} lines)",
        in_path.display(),
        out_path.display(),
        stats.blocks,
        stats.bytes,
        stats.lines
    );
    Ok(())
}

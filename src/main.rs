use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::thread;

use recaf::{convert, open_source, CodecRegistry, ConvertRequest, FourCc, ThreadState, FORMAT_LPCM};

#[derive(Parser)]
#[command(name = "recaf")]
#[command(version)]
#[command(about = "audio file converter with CAF output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an audio file to a CAF file
    Convert {
        /// Input audio file (caf, wav, mp3, flac, ogg, m4a)
        input: PathBuf,
        /// Output CAF file
        output: PathBuf,
        /// Output data format: pcm, aac, alac, ilbc, ima4 or any four-character code
        #[arg(short, long, default_value = "pcm")]
        format: String,
        /// Output sample rate in Hz (0 keeps the source rate)
        #[arg(short, long, default_value = "0")]
        rate: f64,
    },
    /// Show information about an audio file
    Info {
        /// Input audio file
        input: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            format,
            rate,
        } => run_convert(input, output, &format, rate),
        Commands::Info { input, json } => info(&input, json),
    }
}

fn parse_format(s: &str) -> Result<FourCc> {
    // named aliases are case-insensitive; raw four-character codes are
    // case-sensitive and pass through verbatim
    let code = match s.to_ascii_lowercase().as_str() {
        "pcm" | "lpcm" => FORMAT_LPCM,
        "aac" => recaf::FORMAT_AAC,
        "alac" => recaf::FORMAT_ALAC,
        "ilbc" => recaf::FORMAT_ILBC,
        "ima4" => recaf::FORMAT_IMA4,
        _ => FourCc::parse(s)
            .with_context(|| format!("not a format name or four-character code: {}", s))?,
    };
    Ok(code)
}

fn run_convert(input: PathBuf, output: PathBuf, format: &str, rate: f64) -> Result<()> {
    if rate < 0.0 {
        bail!("sample rate cannot be negative");
    }
    let request = ConvertRequest {
        source: input,
        destination: output,
        output_format: parse_format(format)?,
        output_sample_rate: rate,
    };

    println!(
        "Converting {} -> {}...",
        request.source.display(),
        request.destination.display()
    );

    // the conversion runs on its own worker thread; the state handle stays
    // on this thread so interruption events could pause the worker
    let state = ThreadState::new();
    let worker_state = state.clone();
    let worker = thread::spawn(move || {
        let registry = CodecRegistry::default();
        convert(&request, &registry, &worker_state)
    });

    let stats = worker
        .join()
        .map_err(|_| anyhow::anyhow!("conversion worker panicked"))?
        .context("conversion failed")?;

    println!("  Output packets: {}", stats.output_packets);
    println!("  Output frames: {}", stats.output_frames);
    println!("  Output bytes: {}", stats.output_bytes);
    println!("  Sample rate: {} Hz", stats.output_sample_rate);
    println!("Done.");
    Ok(())
}

#[derive(serde::Serialize)]
struct FileInfo {
    format: String,
    sample_rate: f64,
    channels: u32,
    bits_per_channel: u32,
    bytes_per_packet: u32,
    frames_per_packet: u32,
    packets: u64,
    duration_secs: Option<f64>,
}

fn info(input: &PathBuf, json: bool) -> Result<()> {
    let source = open_source(input).context("failed to open input file")?;
    let format = source
        .data_format()
        .context("failed to read the data format")?;
    let packets = source.packet_count().context("failed to count packets")?;

    // duration needs a fixed frames-per-packet; variable-frames formats
    // would need the packet table summed
    let duration_secs = if format.frames_per_packet > 0 && format.sample_rate > 0.0 {
        Some(packets as f64 * format.frames_per_packet as f64 / format.sample_rate)
    } else {
        None
    };

    let info = FileInfo {
        format: format.format_id.to_string(),
        sample_rate: format.sample_rate,
        channels: format.channels_per_frame,
        bits_per_channel: format.bits_per_channel,
        bytes_per_packet: format.bytes_per_packet,
        frames_per_packet: format.frames_per_packet,
        packets,
        duration_secs,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", input.display());
        println!("  Format: {}", info.format);
        println!("  Sample rate: {} Hz", info.sample_rate);
        println!("  Channels: {}", info.channels);
        if info.bits_per_channel > 0 {
            println!("  Bit depth: {}", info.bits_per_channel);
        }
        println!("  Packets: {}", info.packets);
        if let Some(secs) = info.duration_secs {
            println!("  Duration: {:.2}s", secs);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_aliases_are_case_insensitive() {
        assert_eq!(parse_format("PCM").unwrap(), FORMAT_LPCM);
        assert_eq!(parse_format("Aac").unwrap(), recaf::FORMAT_AAC);
    }

    #[test]
    fn test_parse_format_keeps_raw_code_case() {
        assert_eq!(parse_format("QDM2").unwrap(), FourCc::new(b"QDM2"));
    }

    #[test]
    fn test_parse_format_rejects_wrong_length() {
        assert!(parse_format("toolong").is_err());
        assert!(parse_format("abc").is_err());
    }
}

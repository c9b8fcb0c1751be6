use clap::{ArgGroup, Parser};
use image::ImageFormat;
use qrmark::logo::{DEFAULT_LOGO_SIZE, DEFAULT_PLATE_PADDING};
use qrmark::{build, LogoSpec, QrCodeEcc, RenderOptions, Version};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qrmark")]
#[command(about = "Generate a QR code PNG with an optional centered logo")]
#[command(group(ArgGroup::new("payload").required(true).args(["text", "from_file"])))]
struct Cli {
    /// Text, URL or JSON to encode
    #[arg(long)]
    text: Option<String>,

    /// Read the payload from a UTF-8 file
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Output PNG path
    #[arg(short, long, default_value = "qr.png")]
    outfile: PathBuf,

    /// Error correction level (L, M, Q or H)
    #[arg(long, default_value = "M")]
    ec_level: QrCodeEcc,

    /// Pixels per module
    #[arg(long, default_value_t = 10)]
    box_size: u32,

    /// Quiet zone width in modules
    #[arg(long, default_value_t = 4)]
    border: u32,

    /// Symbol version 1-40; picked automatically when omitted
    #[arg(long = "version")]
    symbol_version: Option<u32>,

    /// Logo image to place in the center
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Logo size in pixels, shorter side
    #[arg(long, default_value_t = DEFAULT_LOGO_SIZE)]
    logo_size: u32,

    /// Padding around the logo on its backing plate, in pixels
    #[arg(long, default_value_t = DEFAULT_PLATE_PADDING)]
    logo_padding: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let payload = match (&cli.text, &cli.from_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err("one of --text or --from-file is required".into()),
    };
    let payload = payload.trim();
    debug!(bytes = payload.len(), "payload loaded");

    let version = cli.symbol_version.map(Version::try_from).transpose()?;
    let options = RenderOptions::new(cli.box_size, cli.border);
    let logo = cli.logo.as_ref().map(|path| {
        LogoSpec::from_file(path)
            .with_target_size(cli.logo_size)
            .with_padding(cli.logo_padding)
    });

    let img = build(
        payload.as_bytes(),
        cli.ec_level,
        &options,
        version,
        logo.as_ref(),
    )?;
    img.save_with_format(&cli.outfile, ImageFormat::Png)?;
    println!("Saved: {}", cli.outfile.display());
    Ok(())
}

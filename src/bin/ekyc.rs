//! CLI binary for ekyc-pipeline.
//!
//! A thin shim over the library crate: one process is one operator session.
//! Flags map onto the session's slots, edit parameters and API parameters,
//! and the result is printed as JSON.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ekyc_pipeline::{
    ClientConfig, CropBox, Credentials, EditParams, EkycError, Endpoint, Environment,
    HttpTransport, ImageAsset, JourneyResponse, Session, Slot, Submitter, TargetFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Get a journey id
  ekyc --username ops --password '***' journey

  # Preview edits locally (no network)
  ekyc preview card.jpg -o card-edited.png --brightness 1.2 --margin 20

  # Non-passport document check with a crop
  ekyc --journey-id J123 doc mykad.jpg --crop 40,30,980,640

  # Passport
  ekyc --journey-id J123 passport --half half.jpg --full full.jpg --country MYS

  # ID card front + back as PNG
  ekyc --journey-id J123 idcard --front front.jpg --back back.jpg --format png

  # Same brightness for both sides, crop only the front
  ekyc --journey-id J123 idcard --front f.jpg --back b.jpg --brightness 1.2 \
       --front-crop 40,30,980,640

  # Face match and liveness
  ekyc --journey-id J123 face-match --id-card card.jpg --best selfie.jpg --liveness
  ekyc --journey-id J123 liveness --best selfie.jpg

ENVIRONMENT VARIABLES:
  EKYC_ENV          demo (default) or production
  EKYC_USERNAME     Portal username
  EKYC_PASSWORD     Portal password
  EKYC_JOURNEY_ID   Journey id obtained earlier
"#;

/// Edit identity-document and face images and submit them for eKYC checks.
#[derive(Parser, Debug)]
#[command(
    name = "ekyc",
    version,
    about = "Edit identity-document and face images and submit them for eKYC checks",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Portal to talk to.
    #[arg(long = "env", env = "EKYC_ENV", value_enum, default_value = "demo", global = true)]
    environment: EnvArg,

    /// Use this journey id instead of logging in.
    #[arg(long, env = "EKYC_JOURNEY_ID", global = true)]
    journey_id: Option<String>,

    /// Portal username (used when no journey id is given).
    #[arg(long, env = "EKYC_USERNAME", global = true)]
    username: Option<String>,

    /// Portal password.
    #[arg(long, env = "EKYC_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// JPEG quality for every JPEG payload (1–100).
    #[arg(long, env = "EKYC_JPEG_QUALITY", default_value_t = 85, global = true,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Do not re-attach embedded ICC colour profiles.
    #[arg(long, global = true)]
    no_icc: bool,

    /// Use best compression for PNG payloads.
    #[arg(long, global = true)]
    optimize_png: bool,

    /// Print responses as compact single-line JSON, without status lines.
    #[arg(long, global = true)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "EKYC_NO_PROGRESS", global = true)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EKYC_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors and the response body.
    #[arg(short, long, env = "EKYC_QUIET", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange username/password for a journey id.
    Journey,
    /// Apply edits to an image and write the result; no network call.
    Preview(PreviewArgs),
    /// OkayDoc check of a non-passport document.
    Doc(DocArgs),
    /// OkayDoc check of a passport.
    Passport(PassportArgs),
    /// OkayID check of an ID card, front and back.
    Idcard(IdCardArgs),
    /// OkayFace match of an ID photo against a selfie.
    FaceMatch(FaceMatchArgs),
    /// OkayLive liveness check of a selfie.
    Liveness(LivenessArgs),
}

/// Level and margin edits applied to every image of a command. Crop boxes
/// are per image, see each command's `--*crop` flags.
#[derive(Args, Debug, Clone)]
struct EditArgs {
    /// Brightness factor (0.0–3.0, 1.0 = unchanged).
    #[arg(long, default_value_t = 1.0)]
    brightness: f32,

    /// Contrast factor (0.0–3.0, 1.0 = unchanged).
    #[arg(long, default_value_t = 1.0)]
    contrast: f32,

    /// Black border added on every side, in pixels (0–300). Ignored for an
    /// image that has a crop box.
    #[arg(long, default_value_t = 0)]
    margin: u32,
}

impl EditArgs {
    fn params(&self, crop: Option<CropBox>) -> EditParams {
        EditParams {
            brightness: self.brightness,
            contrast: self.contrast,
            margin: self.margin,
            crop,
        }
    }
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Image to edit.
    image: PathBuf,
    /// Output file; the extension picks PNG or JPEG.
    #[arg(short, long)]
    output: PathBuf,
    /// Crop box in original pixels: left,top,right,bottom.
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropBox>,
    #[command(flatten)]
    edit: EditArgs,
}

#[derive(Args, Debug)]
struct DocArgs {
    /// Document image.
    image: PathBuf,
    /// Document type.
    #[arg(long, default_value = "mykad")]
    doc_type: String,
    /// API version.
    #[arg(long = "api-version", default_value = "7")]
    version: String,
    /// Turn every document check off.
    #[arg(long)]
    no_checks: bool,
    /// Crop box in original pixels: left,top,right,bottom.
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropBox>,
    #[command(flatten)]
    edit: EditArgs,
}

#[derive(Args, Debug)]
struct PassportArgs {
    /// Half-size (data page) image.
    #[arg(long)]
    half: PathBuf,
    /// Optional full-size image.
    #[arg(long)]
    full: Option<PathBuf>,
    /// Issuing country code, e.g. MYS.
    #[arg(long)]
    country: String,
    /// Crop box for the half-size image: left,top,right,bottom.
    #[arg(long, value_parser = parse_crop)]
    half_crop: Option<CropBox>,
    /// Crop box for the full-size image.
    #[arg(long, value_parser = parse_crop)]
    full_crop: Option<CropBox>,
    #[command(flatten)]
    edit: EditArgs,
}

#[derive(Args, Debug)]
struct IdCardArgs {
    /// Front of the card.
    #[arg(long)]
    front: PathBuf,
    /// Back of the card.
    #[arg(long)]
    back: PathBuf,
    /// Encoding of both images.
    #[arg(long, value_enum, default_value = "jpg")]
    format: FormatArg,
    /// Do not ask for the cropped card image in the response.
    #[arg(long)]
    no_image: bool,
    /// Do not ask for the face image in the response.
    #[arg(long)]
    no_face_image: bool,
    /// Cambodian ID card.
    #[arg(long)]
    cambodia: bool,
    /// Crop box for the front image: left,top,right,bottom.
    #[arg(long, value_parser = parse_crop)]
    front_crop: Option<CropBox>,
    /// Crop box for the back image.
    #[arg(long, value_parser = parse_crop)]
    back_crop: Option<CropBox>,
    #[command(flatten)]
    edit: EditArgs,
}

#[derive(Args, Debug)]
struct FaceMatchArgs {
    /// ID card photo.
    #[arg(long)]
    id_card: PathBuf,
    /// Best selfie frame.
    #[arg(long)]
    best: PathBuf,
    /// Also run liveness detection on the selfie.
    #[arg(long)]
    liveness: bool,
    /// Crop box for the ID card photo: left,top,right,bottom.
    #[arg(long, value_parser = parse_crop)]
    id_card_crop: Option<CropBox>,
    /// Crop box for the selfie.
    #[arg(long, value_parser = parse_crop)]
    best_crop: Option<CropBox>,
    #[command(flatten)]
    edit: EditArgs,
}

#[derive(Args, Debug)]
struct LivenessArgs {
    /// Best selfie frame.
    #[arg(long)]
    best: PathBuf,
    /// Crop box in original pixels: left,top,right,bottom.
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropBox>,
    #[command(flatten)]
    edit: EditArgs,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EnvArg {
    Demo,
    Production,
}

impl From<EnvArg> for Environment {
    fn from(v: EnvArg) -> Self {
        match v {
            EnvArg::Demo => Environment::Demo,
            EnvArg::Production => Environment::Production,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Jpg,
    Png,
}

impl From<FormatArg> for TargetFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpg => TargetFormat::Jpeg,
            FormatArg::Png => TargetFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ClientConfig::builder()
        .environment(cli.environment.into())
        .jpeg_quality(cli.jpeg_quality)
        .preserve_icc_profile(!cli.no_icc)
        .optimize_png(cli.optimize_png)
        .build()
        .context("Invalid configuration")?;
    let mut session = Session::new(config);

    // ── Preview: purely local ────────────────────────────────────────────
    if let Command::Preview(ref args) = cli.command {
        return run_preview(&mut session, args);
    }

    let submitter = Submitter::new(HttpTransport::new().context("Failed to build HTTP client")?);

    // ── Journey ──────────────────────────────────────────────────────────
    if let Command::Journey = cli.command {
        let credentials = credentials(&cli)?.context("--username and --password are required")?;
        let response = with_spinner(&cli, "Requesting journey id…", async {
            submitter.acquire_journey(&mut session, &credentials).await
        })
        .await?;
        return report_journey(&cli, &response);
    }

    if let Some(ref id) = cli.journey_id {
        session.set_journey_id(id.clone());
    } else if let Some(credentials) = credentials(&cli)? {
        let response = with_spinner(&cli, "Requesting journey id…", async {
            submitter.acquire_journey(&mut session, &credentials).await
        })
        .await?;
        if response.journey_id().is_none() {
            bail!("Could not obtain a journey id:\n{response}");
        }
    }

    // ── Submission ───────────────────────────────────────────────────────
    let endpoint = load_command(&mut session, &cli.command)?;
    let label = format!("Sending {endpoint} request…");
    let outcome = with_spinner(&cli, &label, submitter.submit(&session, endpoint)).await;

    match outcome {
        Ok(body) => {
            if !cli.quiet && !cli.json {
                eprintln!("{} {} request successful", green("✔"), bold(&endpoint.to_string()));
            }
            print_json(&cli, &body)
        }
        Err(EkycError::Remote { status, body }) => {
            eprintln!("{} API request failed with status code: {status}", red("✘"));
            match body.as_json() {
                Some(v) => print_json(&cli, v)?,
                None => println!("{body}"),
            }
            bail!("{endpoint} request rejected (HTTP {status})")
        }
        Err(e) => Err(e).with_context(|| format!("{endpoint} request failed")),
    }
}

fn print_json(cli: &Cli, value: &serde_json::Value) -> Result<()> {
    let text = if cli.json {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise response")?;
    println!("{text}");
    Ok(())
}

fn credentials(cli: &Cli) -> Result<Option<Credentials>> {
    match (&cli.username, &cli.password) {
        (Some(u), Some(p)) => Ok(Some(Credentials::new(u.clone(), p.clone()))),
        (None, None) => Ok(None),
        _ => bail!("Please enter both username and password."),
    }
}

fn report_journey(cli: &Cli, response: &JourneyResponse) -> Result<()> {
    match response.journey_id() {
        Some(id) => {
            if !cli.quiet && !cli.json {
                eprintln!("{} Journey ID retrieved!", green("✔"));
            }
            println!("{id}");
            Ok(())
        }
        None => {
            eprintln!("{}", response);
            bail!("No journey id in the response")
        }
    }
}

fn run_preview(session: &mut Session, args: &PreviewArgs) -> Result<()> {
    load_slot(session, Slot::Doc, &args.image, args.edit.params(args.crop))?;
    let preview = session
        .preview(Slot::Doc)
        .context("Image was not loaded")?;
    if let Some(ref w) = preview.warning {
        eprintln!("{} {w}", yellow("⚠"));
    }
    preview
        .image
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    eprintln!(
        "{} {}x{} → {}",
        green("✔"),
        preview.image.width(),
        preview.image.height(),
        bold(&args.output.display().to_string())
    );
    Ok(())
}

/// Fill the session's slots and parameters for a submit command.
fn load_command(session: &mut Session, command: &Command) -> Result<Endpoint> {
    let endpoint = match command {
        Command::Doc(a) => {
            load_slot(session, Slot::Doc, &a.image, a.edit.params(a.crop))?;
            session.okaydoc.doc_type = a.doc_type.clone();
            session.okaydoc.version = a.version.clone();
            if a.no_checks {
                session.okaydoc = session.okaydoc.clone().with_all_checks(false);
            }
            Endpoint::Document
        }
        Command::Passport(a) => {
            load_slot(session, Slot::Half, &a.half, a.edit.params(a.half_crop))?;
            if let Some(ref full) = a.full {
                load_slot(session, Slot::Full, full, a.edit.params(a.full_crop))?;
            }
            session.passport.country = a.country.clone();
            Endpoint::Passport
        }
        Command::Idcard(a) => {
            load_slot(session, Slot::Front, &a.front, a.edit.params(a.front_crop))?;
            load_slot(session, Slot::Back, &a.back, a.edit.params(a.back_crop))?;
            session.okayid.image_format = a.format.into();
            session.okayid.image_enabled = !a.no_image;
            session.okayid.face_image_enabled = !a.no_face_image;
            session.okayid.cambodia = a.cambodia;
            Endpoint::IdCard
        }
        Command::FaceMatch(a) => {
            load_slot(session, Slot::IdCard, &a.id_card, a.edit.params(a.id_card_crop))?;
            load_slot(session, Slot::Best, &a.best, a.edit.params(a.best_crop))?;
            session.face_match.liveness_detection = a.liveness;
            Endpoint::FaceMatch
        }
        Command::Liveness(a) => {
            load_slot(session, Slot::Best, &a.best, a.edit.params(a.crop))?;
            Endpoint::Liveness
        }
        Command::Journey | Command::Preview(_) => bail!("not a submit command"),
    };
    Ok(endpoint)
}

fn load_slot(session: &mut Session, slot: Slot, path: &Path, edits: EditParams) -> Result<()> {
    let asset = ImageAsset::from_path(path)
        .with_context(|| format!("Failed to load {} image '{}'", slot, path.display()))?;
    session.upload(slot, asset);
    session
        .set_edit_params(slot, edits)
        .with_context(|| format!("Invalid edit parameters for {slot}"))?;
    Ok(())
}

/// Show a spinner on stderr while `fut` runs.
async fn with_spinner<F: Future>(cli: &Cli, message: &str, fut: F) -> F::Output {
    if cli.quiet || cli.no_progress {
        return fut.await;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    let out = fut.await;
    bar.finish_and_clear();
    out
}

/// Parse `--crop left,top,right,bottom`.
fn parse_crop(s: &str) -> Result<CropBox, String> {
    let values: Vec<u32> = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("Invalid crop coordinate: '{}'", v.trim()))
        })
        .collect::<Result<_, _>>()?;
    match values[..] {
        [left, top, right, bottom] => Ok(CropBox::new(left, top, right, bottom)),
        _ => Err(format!(
            "Crop box needs 4 values (left,top,right,bottom), got {}",
            values.len()
        )),
    }
}

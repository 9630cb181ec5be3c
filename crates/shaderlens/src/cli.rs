use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lensconfig::ApiSetting;
use renderer::PixelSize;

#[derive(Parser, Debug)]
#[command(
    name = "shaderlens",
    author,
    version,
    about = "Explore fragment shaders line by line with a live GPU preview"
)]
pub struct Cli {
    /// Configuration file (defaults to `shaderlens.toml` in the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base URL of the explanation service, e.g. `http://localhost:3001/api`.
    #[arg(long, global = true, env = "SHADERLENS_API_BASE", value_name = "URL")]
    pub api_base: Option<String>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window that renders the shader and reloads it when the file changes.
    Preview(PreviewArgs),
    /// Compile the shader offline and report the first diagnostic.
    Check(FileArg),
    /// List the numeric literals that can be varied.
    Params(ParamsArgs),
    /// Ask the service to explain a set of lines.
    Explain(ExplainArgs),
    /// Ask the service for alternatives to one numeric literal.
    Vary(VaryArgs),
    /// Render one frame offscreen and save it as PNG.
    Snapshot(SnapshotArgs),
}

#[derive(Args, Debug)]
pub struct FileArg {
    /// Shader file containing a `mainImage` function.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct RenderOptions {
    /// Render resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<PixelSize>,

    /// Graphics API: `auto`, `modern` (Vulkan/Metal/DX12) or `legacy` (GL).
    #[arg(long, value_name = "API", value_parser = parse_api)]
    pub api: Option<ApiSetting>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub file: FileArg,

    #[command(flatten)]
    pub render: RenderOptions,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,
}

#[derive(Args, Debug)]
pub struct ParamsArgs {
    #[command(flatten)]
    pub file: FileArg,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub file: FileArg,

    /// One-based lines to explain, e.g. `3,5-7`.
    #[arg(long, value_name = "LINES", value_parser = parse_line_spec)]
    pub lines: LineSpec,

    /// Open a preview window with the isolation shader.
    #[arg(long)]
    pub preview: bool,

    #[command(flatten)]
    pub render: RenderOptions,
}

#[derive(Args, Debug)]
pub struct VaryArgs {
    #[command(flatten)]
    pub file: FileArg,

    /// One-based line holding the literal.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub line: u32,

    /// Literal to vary; defaults to the first one on the line.
    #[arg(long, value_name = "VALUE")]
    pub value: Option<String>,

    /// Apply the K-th variation (one-based) to the shader.
    #[arg(long, value_name = "K", value_parser = clap::value_parser!(u32).range(1..))]
    pub apply: Option<u32>,

    /// Where to write the applied shader (defaults to stdout).
    #[arg(long, value_name = "PATH", requires = "apply")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub file: FileArg,

    /// PNG file to write.
    #[arg(long, short, value_name = "PNG")]
    pub output: PathBuf,

    #[command(flatten)]
    pub render: RenderOptions,

    /// Shader time in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0, value_parser = parse_time)]
    pub time: f64,
}

/// Sorted, de-duplicated zero-based line indices parsed from one-based input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpec(pub Vec<usize>);

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<PixelSize, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| format!("expected WxH format, e.g. 1280x720 (got '{trimmed}')"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}'", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}'", height.trim()))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".to_string());
    }
    Ok(PixelSize::new(width, height))
}

pub fn parse_api(value: &str) -> Result<ApiSetting, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("graphics api must not be empty".to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "auto" => Ok(ApiSetting::Auto),
        "modern" | "vulkan" | "metal" | "dx12" => Ok(ApiSetting::Modern),
        "legacy" | "gl" | "gles" | "opengl" => Ok(ApiSetting::Legacy),
        other => Err(format!(
            "unknown graphics api '{other}'; expected auto, modern, or legacy"
        )),
    }
}

pub fn parse_line_spec(value: &str) -> Result<LineSpec, String> {
    let mut lines = Vec::new();
    for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_line(start)?, parse_line(end)?),
            None => {
                let line = parse_line(part)?;
                (line, line)
            }
        };
        if end < start {
            return Err(format!("line range '{part}' runs backwards"));
        }
        lines.extend((start..=end).map(|line| line - 1));
    }
    if lines.is_empty() {
        return Err("no lines given".to_string());
    }
    lines.sort_unstable();
    lines.dedup();
    Ok(LineSpec(lines))
}

fn parse_line(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("line numbers start at 1".to_string()),
        Ok(line) => Ok(line),
        Err(_) => Err(format!("invalid line number '{}'", value.trim())),
    }
}

fn parse_time(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{}'", value.trim()))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err("time must be a non-negative number of seconds".to_string());
    }
    Ok(seconds)
}

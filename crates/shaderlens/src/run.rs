use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use lensapi::{Interpretation, ServiceClient};
use lensconfig::{ApiSetting, LensConfig, PowerSetting};
use renderer::compile::check_fragment;
use renderer::{ApiPreference, GpuPowerPreference, PixelSize};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{
    Cli, Command, ExplainArgs, FileArg, ParamsArgs, PreviewArgs, RenderOptions, SnapshotArgs,
    VaryArgs,
};
use crate::params::{self, NumericParam};
use crate::paths::AppPaths;
use crate::preview::{self, PreviewOptions, SourceFeed, SourceWatcher};
use crate::session::LensSession;
use crate::snapshot::{self, SnapshotOptions};

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    initialise_tracing(&config.log.level);
    tracing::debug!(base_url = %config.service.base_url, "configuration resolved");

    match cli.command {
        Command::Preview(args) => run_preview(&config, args),
        Command::Check(args) => run_check(&args),
        Command::Params(args) => run_params(&args),
        Command::Explain(args) => run_explain(&config, args),
        Command::Vary(args) => run_vary(&config, &args),
        Command::Snapshot(args) => run_snapshot(&config, &args),
    }
}

fn initialise_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Reads the config file and layers command-line overrides on top.
fn load_config(cli: &Cli) -> Result<LensConfig> {
    let mut config = match cli.config.as_ref() {
        Some(path) => LensConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            let paths = AppPaths::discover()?;
            tracing::debug!(dir = %paths.config_dir().display(), "using config directory");
            let path = paths.config_file();
            LensConfig::load_or_default(&path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
    };
    if let Some(base) = cli.api_base.as_ref() {
        lensconfig::validate_base_url(base)?;
        config.service.base_url = base.clone();
    }
    if let Some(level) = cli.log_level.as_ref() {
        config.log.level = level.clone();
    }
    Ok(config)
}

fn api_preference(setting: ApiSetting) -> ApiPreference {
    match setting {
        ApiSetting::Auto => ApiPreference::Auto,
        ApiSetting::Modern => ApiPreference::Modern,
        ApiSetting::Legacy => ApiPreference::Legacy,
    }
}

fn power_preference(setting: PowerSetting) -> GpuPowerPreference {
    match setting {
        PowerSetting::High => GpuPowerPreference::High,
        PowerSetting::Low => GpuPowerPreference::Low,
    }
}

fn read_shader(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read shader {}", path.display()))
}

fn build_client(config: &LensConfig) -> Result<ServiceClient> {
    ServiceClient::new(&config.service.base_url, config.service.timeout)
        .context("failed to construct service client")
}

fn preview_options(config: &LensConfig, render: &RenderOptions, title: String) -> PreviewOptions {
    PreviewOptions {
        title,
        size: render
            .size
            .unwrap_or(PixelSize::new(config.preview.width, config.preview.height)),
        fps: config.preview_fps(),
        api: api_preference(render.api.unwrap_or(config.renderer.api)),
        power: power_preference(config.renderer.power),
        reload_interval: config.preview.reload_interval,
    }
}

fn window_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("shaderlens - {name}")
}

fn run_preview(config: &LensConfig, args: PreviewArgs) -> Result<()> {
    let path = args.file.file;
    let source = read_shader(&path)?;
    let mut options = preview_options(config, &args.render, window_title(&path));
    if let Some(fps) = args.fps {
        options.fps = Some(fps).filter(|fps| *fps > 0.0);
    }
    tracing::info!(path = %path.display(), "starting preview");

    let feed = SourceFeed {
        watch: Some(SourceWatcher::new(
            path,
            options.reload_interval,
            Instant::now(),
        )),
        updates: None,
    };
    preview::run_preview(&source, feed, options)
}

fn run_check(args: &FileArg) -> Result<()> {
    let source = read_shader(&args.file)?;
    check_fragment(&source)
        .with_context(|| format!("{} does not compile", args.file.display()))?;
    println!("{}: ok", args.file.display());
    Ok(())
}

#[derive(Serialize)]
struct ParamRow<'a> {
    id: String,
    #[serde(flatten)]
    param: &'a NumericParam,
}

fn run_params(args: &ParamsArgs) -> Result<()> {
    let source = read_shader(&args.file.file)?;
    let found = params::scan_shader(&source);
    let mut out = io::stdout().lock();
    if args.json {
        let rows: Vec<ParamRow<'_>> = found
            .iter()
            .map(|param| ParamRow {
                id: param.id(),
                param,
            })
            .collect();
        serde_json::to_writer_pretty(&mut out, &rows)?;
        writeln!(out)?;
        return Ok(());
    }
    let lines: Vec<&str> = source.split('\n').collect();
    for param in &found {
        let context = lines.get(param.line).map_or("", |line| line.trim());
        writeln!(
            out,
            "{:>5}:{:<4} {:<10} {context}",
            param.line + 1,
            param.column + 1,
            param.value
        )?;
    }
    Ok(())
}

/// Selects `indices` (zero-based) in a fresh session, skipping lines past the
/// end of the shader.
fn select_lines(source: &str, indices: &[usize]) -> Result<LensSession> {
    let mut session = LensSession::new(source);
    let line_count = session.lines().len();
    for &index in indices {
        if index < line_count {
            session.click_line(index, false);
        } else {
            tracing::warn!(line = index + 1, line_count, "ignoring line past end of shader");
        }
    }
    if session.selection().is_empty() {
        bail!("none of the requested lines exist (shader has {line_count} lines)");
    }
    Ok(session)
}

fn explain(session: &mut LensSession, client: &ServiceClient) -> Result<Interpretation> {
    let selected = session.selection().selected_lines(&session.lines()).join("\n");
    tracing::info!(lines = session.selection().len(), "requesting explanation");
    println!("{selected}\n");
    let interpretation = session
        .explain(client)?
        .cloned()
        .context("no lines selected")?;
    println!("{}\n", interpretation.explanation);
    println!("--- isolation shader ---\n{}", interpretation.isolation_shader);
    if let Err(err) = check_fragment(&interpretation.isolation_shader) {
        tracing::warn!(%err, "isolation shader does not compile");
    }
    Ok(interpretation)
}

fn run_explain(config: &LensConfig, args: ExplainArgs) -> Result<()> {
    let path = args.file.file;
    let source = read_shader(&path)?;
    let mut session = select_lines(&source, &args.lines.0)?;
    let client = build_client(config)?;

    if !args.preview {
        explain(&mut session, &client)?;
        return Ok(());
    }

    // The window shows the full shader until the isolation shader arrives.
    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker = thread::Builder::new()
        .name("shaderlens-explain".into())
        .spawn(move || -> Result<()> {
            let interpretation = explain(&mut session, &client).inspect_err(|err| {
                tracing::error!("explanation failed: {err:#}");
            })?;
            // The window may already be closed.
            let _ = tx.send(interpretation.isolation_shader);
            Ok(())
        })
        .context("failed to spawn explanation worker")?;

    let options = preview_options(config, &args.render, window_title(&path));
    let feed = SourceFeed {
        watch: None,
        updates: Some(rx),
    };
    preview::run_preview(&source, feed, options)?;

    match worker.join() {
        Ok(result) => result,
        Err(_) => bail!("explanation worker panicked"),
    }
}

fn run_vary(config: &LensConfig, args: &VaryArgs) -> Result<()> {
    let source = read_shader(&args.file.file)?;
    let line = args.line as usize - 1;
    let Some(param) = params::find_on_line(&source, line, args.value.as_deref()) else {
        match args.value.as_deref() {
            Some(value) => bail!("no numeric literal '{value}' on line {}", args.line),
            None => bail!("no numeric literal on line {}", args.line),
        }
    };

    let client = build_client(config)?;
    let mut session = LensSession::new(source);
    let set = session.request_variations(&client, param)?.clone();

    if let Some(active) = session.active_param() {
        eprintln!(
            "{} ({} at {}:{}):",
            set.param_name,
            active.value,
            active.line + 1,
            active.column + 1
        );
    }
    for (index, variation) in set.variations.iter().enumerate() {
        eprintln!(
            "  {}. {} = {}  {}",
            index + 1,
            variation.label,
            variation.value,
            variation.description
        );
    }

    let Some(choice) = args.apply else {
        return Ok(());
    };
    let Some(variation) = set.variations.get(choice as usize - 1) else {
        bail!(
            "variation {choice} does not exist ({} returned)",
            set.variations.len()
        );
    };
    session.apply_variation(variation);
    if let Err(err) = check_fragment(session.shader()) {
        tracing::warn!(%err, "varied shader does not compile");
    }

    match args.output.as_ref() {
        Some(path) => {
            fs::write(path, session.shader())
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), value = %variation.value, "variation applied");
        }
        None => print!("{}", session.shader()),
    }
    Ok(())
}

fn run_snapshot(config: &LensConfig, args: &SnapshotArgs) -> Result<()> {
    let source = read_shader(&args.file.file)?;
    let options = SnapshotOptions {
        size: args
            .render
            .size
            .unwrap_or(PixelSize::new(config.preview.width, config.preview.height)),
        time: Duration::from_secs_f64(args.time),
        api: api_preference(args.render.api.unwrap_or(config.renderer.api)),
        power: power_preference(config.renderer.power),
    };
    snapshot::write_snapshot(&source, &args.output, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("shaderlens").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn explicit_config_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lens.toml");
        fs::write(
            &path,
            "version = 1\n[service]\nbase_url = \"http://a/api\"\n[log]\nlevel = \"warn\"\n",
        )
        .unwrap();
        let path_arg = path.to_str().unwrap();

        let config = load_config(&cli(&["--config", path_arg, "check", "x.glsl"])).unwrap();
        assert_eq!(config.log.level, "warn");

        let config = load_config(&cli(&[
            "--config",
            path_arg,
            "--api-base",
            "https://b/api",
            "--log-level",
            "debug",
            "check",
            "x.glsl",
        ]))
        .unwrap();
        assert_eq!(config.service.base_url, "https://b/api");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn bad_api_base_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lens.toml");
        fs::write(&path, "version = 1\n").unwrap();
        let result = load_config(&cli(&[
            "--config",
            path.to_str().unwrap(),
            "--api-base",
            "localhost:3001",
            "check",
            "x.glsl",
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = load_config(&cli(&["--config", missing.to_str().unwrap(), "check", "x"]));
        assert!(result.is_err());
    }

    #[test]
    fn render_options_override_config() {
        let mut config = LensConfig::default();
        config.renderer.api = ApiSetting::Legacy;
        config.renderer.power = PowerSetting::Low;

        let options = preview_options(&config, &RenderOptions::default(), "t".into());
        assert_eq!(options.size, PixelSize::new(960, 540));
        assert_eq!(options.api, ApiPreference::Legacy);
        assert_eq!(options.power, GpuPowerPreference::Low);

        let render = RenderOptions {
            size: Some(PixelSize::new(10, 20)),
            api: Some(ApiSetting::Modern),
        };
        let options = preview_options(&config, &render, "t".into());
        assert_eq!(options.size, PixelSize::new(10, 20));
        assert_eq!(options.api, ApiPreference::Modern);
    }

    #[test]
    fn selection_skips_lines_past_the_end() {
        let session = select_lines("a\nb\nc", &[1, 9]).unwrap();
        assert_eq!(session.selection().sorted_indices(), vec![1]);
        assert!(select_lines("a", &[4]).is_err());
    }

    #[test]
    fn window_title_uses_file_name() {
        assert_eq!(window_title(Path::new("/tmp/demo.glsl")), "shaderlens - demo.glsl");
    }
}

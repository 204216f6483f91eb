use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use renderer::{
    GpuOptions, GpuPowerPreference, LoopConfig, PresentModePreference, PreviewOptions,
    ValidationError, Validator,
};
use tracing_subscriber::EnvFilter;
use viewconfig::{FragscopeConfig, PowerPreferenceSetting, PresentModeSetting};

use crate::cli::{CheckArgs, RunArgs, TranslateArgs};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads `path`, or the default config file when none is given.
pub fn load_config(path: Option<&Path>) -> Result<FragscopeConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match viewconfig::default_config_path() {
            Some(path) => path,
            None => {
                tracing::debug!("no config directory available; using defaults");
                return Ok(FragscopeConfig::default());
            }
        },
    };
    let config = FragscopeConfig::load(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn read_shader(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read shader {}", path.display()))
}

pub fn run(args: RunArgs, config: FragscopeConfig) -> Result<()> {
    let source = read_shader(&args.shader)?;
    let mut loop_config = loop_config(&config);
    if args.no_gpu_timer {
        loop_config.gpu.timer_queries = false;
    }
    let frozen_time = args
        .frozen_time
        .map(|seconds| {
            if seconds.is_finite() && seconds >= 0.0 {
                Ok(seconds)
            } else {
                Err(anyhow!("--frozen-time must be a non-negative number of seconds"))
            }
        })
        .transpose()?
        .unwrap_or_else(|| config.playback.frozen_time.as_secs_f64());

    let options = PreviewOptions {
        source,
        title: format!("{} - {}", config.window.title, args.shader.display()),
        width: args.width.unwrap_or(config.window.width).max(1),
        height: args.height.unwrap_or(config.window.height).max(1),
        loop_config,
        start_paused: args.paused || config.playback.start_paused,
        frozen_time,
    };
    tracing::info!(
        shader = %args.shader.display(),
        width = options.width,
        height = options.height,
        paused = options.start_paused,
        "opening preview"
    );
    renderer::run_preview(options)
}

pub fn translate(args: TranslateArgs) -> Result<()> {
    let source = read_shader(&args.shader)?;
    let unit = translator::translate(&source)
        .with_context(|| format!("failed to translate {}", args.shader.display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&unit)?);
    } else {
        print!("{}", unit.program());
    }
    Ok(())
}

pub fn check(args: CheckArgs, config: &FragscopeConfig) -> Result<()> {
    let source = read_shader(&args.shader)?;
    let validator = Validator::new(gpu_options(config));
    match validator.validate(&source) {
        Ok(report) if report.is_clean() => {
            println!("{}: ok", args.shader.display());
            Ok(())
        }
        Ok(report) => {
            println!(
                "{}: ok with {} warning(s)",
                args.shader.display(),
                report.warnings.len()
            );
            for warning in &report.warnings {
                println!("  warning: {warning}");
            }
            Ok(())
        }
        Err(ValidationError::Compile(diagnostic)) => {
            eprintln!("{diagnostic}");
            Err(anyhow!("{} failed to compile", args.shader.display()))
        }
        Err(err) => Err(anyhow::Error::new(err)
            .context(format!("failed to validate {}", args.shader.display()))),
    }
}

fn gpu_options(config: &FragscopeConfig) -> GpuOptions {
    GpuOptions {
        power_preference: match config.gpu.power_preference {
            PowerPreferenceSetting::HighPerformance => GpuPowerPreference::High,
            PowerPreferenceSetting::LowPower => GpuPowerPreference::Low,
            PowerPreferenceSetting::None => GpuPowerPreference::None,
        },
        present_mode: match config.gpu.present_mode {
            PresentModeSetting::AutoVsync => PresentModePreference::AutoVsync,
            PresentModeSetting::AutoNoVsync => PresentModePreference::AutoNoVsync,
            PresentModeSetting::Fifo => PresentModePreference::Fifo,
            PresentModeSetting::Mailbox => PresentModePreference::Mailbox,
            PresentModeSetting::Immediate => PresentModePreference::Immediate,
        },
        timer_queries: config.gpu.timer_queries,
    }
}

fn loop_config(config: &FragscopeConfig) -> LoopConfig {
    LoopConfig {
        telemetry: config.telemetry.telemetry_config(),
        publish_interval: config.telemetry.publish_interval,
        diagnostics_samples: config.telemetry.diagnostics_samples,
        gpu: gpu_options(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_maps_onto_loop_settings() {
        let config = FragscopeConfig::from_toml_str(
            r#"
version = 1

[gpu]
power_preference = "low-power"
present_mode = "mailbox"
timer_queries = false

[telemetry]
publish_interval = 30
target_interval = "8ms"
"#,
        )
        .expect("config");

        let loop_config = loop_config(&config);
        assert_eq!(loop_config.publish_interval, 30);
        assert_eq!(loop_config.telemetry.target_interval, Duration::from_millis(8));
        assert_eq!(loop_config.gpu.power_preference, GpuPowerPreference::Low);
        assert_eq!(loop_config.gpu.present_mode, PresentModePreference::Mailbox);
        assert!(!loop_config.gpu.timer_queries);
    }

    #[test]
    fn default_config_keeps_renderer_defaults() {
        let loop_config = loop_config(&FragscopeConfig::default());
        assert_eq!(loop_config, LoopConfig::default());
    }
}

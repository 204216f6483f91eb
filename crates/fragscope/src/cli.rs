use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fragscope",
    author,
    version,
    about = "Run ShaderToy-style fragment shaders with live frame telemetry"
)]
pub struct Cli {
    /// Configuration file (defaults to `config.toml` in the user config directory).
    #[arg(long, global = true, value_name = "FILE", env = "FRAGSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a preview window rendering the shader.
    Run(RunArgs),
    /// Print the program generated for the shader.
    Translate(TranslateArgs),
    /// Compile the shader offscreen and report diagnostics.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Fragment shader source defining `mainImage`.
    #[arg(value_name = "SHADER")]
    pub shader: PathBuf,

    /// Window width in physical pixels.
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Window height in physical pixels.
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Start with the clock paused.
    #[arg(long)]
    pub paused: bool,

    /// Shader time in seconds shown while paused.
    #[arg(long, value_name = "SECONDS")]
    pub frozen_time: Option<f64>,

    /// Disable GPU timestamp queries.
    #[arg(long)]
    pub no_gpu_timer: bool,
}

#[derive(Parser, Debug)]
pub struct TranslateArgs {
    #[arg(value_name = "SHADER")]
    pub shader: PathBuf,

    /// Print the translation unit as JSON instead of the program text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "SHADER")]
    pub shader: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

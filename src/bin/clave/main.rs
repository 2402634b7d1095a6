//! clave - clave-locked MIDI playback and practice
//!
//! Run with: cargo run --features midir -- play --config session.yaml

mod app;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use log::info;

use app::Session;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List MIDI input and output ports
    Ports,
    /// Loop the configured pattern with the clave click
    Play(SessionArgs),
    /// Lock live input onto the clave grid
    Practice(SessionArgs),
}

#[derive(Args, Debug)]
pub(crate) struct SessionArgs {
    /// YAML session file; defaults apply for anything left out
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output port name (substring match), overrides the config file
    #[arg(long)]
    output: Option<String>,

    /// Input port name (substring match), overrides the config file
    #[arg(long)]
    input: Option<String>,

    /// Tempo in BPM, overrides the config file
    #[arg(long)]
    tempo: Option<f64>,

    /// Stop after this many cycles, overrides the config file
    #[arg(long)]
    cycles: Option<u32>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ports => {
            let ports = clave_lock::io::ports::list_ports().wrap_err("Failed to enumerate MIDI ports")?;
            println!("Inputs:");
            for name in &ports.inputs {
                println!("  {name}");
            }
            println!("Outputs:");
            for name in &ports.outputs {
                println!("  {name}");
            }
        }
        Command::Play(args) => {
            let summary = Session::load(&args)?.play()?;
            info!("{:?}", summary);
        }
        Command::Practice(args) => {
            let summary = Session::load(&args)?.practice()?;
            info!("{:?}", summary);
        }
    }

    Ok(())
}

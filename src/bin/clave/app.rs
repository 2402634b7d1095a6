//! Session wiring: configuration file, ports and the interrupt handler.

use std::fs;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;

use clave_lock::engine::{SystemClock, StopSignal};
use clave_lock::io::ports::{InputPort, OutputPort};
use clave_lock::sequencing::bridge::to_step_events;
use clave_lock::{run_playback, run_practice, RunSummary, RuntimeConfig, RuntimeSpec};

use crate::SessionArgs;

pub struct Session {
    config: RuntimeConfig,
    spec: RuntimeSpec,
    stop: StopSignal,
}

impl Session {
    /// Read the config file, apply command-line overrides and validate.
    /// Nothing is opened yet, so a bad setting never touches a port.
    pub fn load(args: &SessionArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let text = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
                serde_yaml::from_str(&text).wrap_err_with(|| format!("Failed to parse {}", path.display()))?
            }
            None => RuntimeConfig::default(),
        };

        if args.output.is_some() {
            config.output_port = args.output.clone();
        }
        if args.input.is_some() {
            config.input_port = args.input.clone();
        }
        if let Some(tempo) = args.tempo {
            config.tempo = tempo;
        }
        if args.cycles.is_some() {
            config.max_cycles = args.cycles;
        }

        let spec = RuntimeSpec::try_from(&config).wrap_err("Invalid session configuration")?;

        let stop = StopSignal::new();
        let handler = stop.clone();
        ctrlc::set_handler(move || handler.trigger()).wrap_err("Failed to install Ctrl-C handler")?;

        Ok(Self { config, spec, stop })
    }

    pub fn play(self) -> Result<RunSummary> {
        let pattern = to_step_events(&self.config.pattern, &self.spec.grid, self.spec.practice.rounding);
        let mut output = OutputPort::open(self.config.output_port.as_deref()).wrap_err("Failed to open output port")?;
        info!("Playing {} notes on '{}', Ctrl-C to stop", self.config.pattern.len(), output.name());

        let summary = run_playback(&self.spec, &pattern, &mut output, &SystemClock::new(), &self.stop)?;
        Ok(summary)
    }

    pub fn practice(self) -> Result<RunSummary> {
        let clock = SystemClock::new();
        let mut output = OutputPort::open(self.config.output_port.as_deref()).wrap_err("Failed to open output port")?;
        let mut input = InputPort::open(self.config.input_port.as_deref(), clock).wrap_err("Failed to open input port")?;
        info!("Practising '{}' -> '{}', Ctrl-C to stop", input.name(), output.name());

        let summary = run_practice(&self.spec, Some(&mut input), &mut output, &clock, &self.stop)?;
        Ok(summary)
    }
}

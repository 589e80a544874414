use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use picolog1000::*;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

const DEVICE_NAME: &str = "picolog1000";

#[derive(Parser)]
#[command(name = "picolog1000")]
#[command(about = "PicoLog 1000 series data logger control", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the in-memory unit instead of the pl1000 library
    #[arg(long)]
    simulate: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one block and print or save it
    Capture {
        /// Seconds to wait for the block
        #[arg(long, default_value_t = 10.0)]
        timeout: f64,

        /// Directory for HDF5 capture files
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the unit information
    Info,
    /// Interactive status screen
    Monitor {
        /// Directory for HDF5 capture files
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(level: LevelFilter, log_file: Option<&PathBuf>, terminal: bool) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if terminal {
        loggers.push(TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let conf = Conf::load(cli.config.as_deref())?;
    let level = conf.log_level()?;

    // the status screen owns the terminal, so it only logs to a file
    let monitor = matches!(cli.command, Commands::Monitor { .. });
    let log_file = match (&cli.log_file, monitor) {
        (None, true) => Some(PathBuf::from("picolog1000.log")),
        (path, _) => path.clone(),
    };
    init_logging(level, log_file.as_ref(), !monitor)?;

    if cli.simulate {
        run(&cli.command, conf, SimulatedPl1000::new())
    } else {
        let lib = Pl1000Library::load().context("failed to load the pl1000 library")?;
        run(&cli.command, conf, lib)
    }
}

fn run<D: Pl1000Api>(command: &Commands, conf: Conf, device: D) -> Result<()> {
    let mut dev = LoggerDevice::new(DEVICE_NAME, device, conf);
    dev.init()?;

    match command {
        Commands::Info => {
            println!("{}", dev.session().info());
            let attrs = dev.snapshot();
            println!("Scale: {} V/count", attrs.scale);
            Ok(())
        }
        Commands::Capture { timeout, output } => capture(&mut dev, *timeout, output.as_ref()),
        Commands::Monitor { output } => monitor(dev, output.as_ref()),
    }
}

fn capture<D: Pl1000Api>(
    dev: &mut LoggerDevice<D>,
    timeout: f64,
    output: Option<&PathBuf>,
) -> Result<()> {
    if !dev.start_recording() {
        return Err(anyhow!("failed to start recording: {}", dev.snapshot().message));
    }
    let timeout = Duration::try_from_secs_f64(timeout).context("invalid timeout")?;
    if !dev.session_mut().wait(timeout)? {
        dev.stop_recording();
        return Err(anyhow!("no data within {:?}", timeout));
    }
    if !dev.poll() {
        return Err(anyhow!("reading data failed: {}", dev.snapshot().message));
    }

    let attrs = dev.snapshot();
    println!(
        "{} points per channel on {} at {} ms, overflow {:#06b}, trigger {}",
        attrs.points_per_channel, attrs.channels, attrs.sampling, attrs.overflow, attrs.trigger
    );
    for w in dev.session().warnings() {
        println!("warning: {}", w);
    }

    match output {
        Some(dir) => {
            let path = save(dev, dir)?;
            println!("Capture written to {}", path.display());
            Ok(())
        }
        None => {
            let channels = dev.conf().acquisition.channels.clone();
            for ch in channels {
                let data = dev.channel_data(ch);
                let head: Vec<String> = data.iter().take(8).map(|v| v.to_string()).collect();
                println!("channel {}: [{}, ...]", ch, head.join(", "));
            }
            Ok(())
        }
    }
}

#[cfg(feature = "hdf5")]
fn save<D: Pl1000Api>(dev: &LoggerDevice<D>, dir: &PathBuf) -> Result<PathBuf> {
    let mut writer = CaptureWriter::new(dir)?;
    writer.write(dev.name(), dev.session())
}

#[cfg(not(feature = "hdf5"))]
fn save<D: Pl1000Api>(_dev: &LoggerDevice<D>, _dir: &PathBuf) -> Result<PathBuf> {
    Err(anyhow!("built without the hdf5 feature, captures can't be saved"))
}

fn monitor<D: Pl1000Api>(dev: LoggerDevice<D>, output: Option<&PathBuf>) -> Result<()> {
    if let Some(dir) = output {
        // surface a missing feature before the terminal is taken over
        if cfg!(not(feature = "hdf5")) {
            return Err(anyhow!(
                "built without the hdf5 feature, can't save to {}",
                dir.display()
            ));
        }
    }
    let mut registry = SessionRegistry::new();
    registry.insert(dev);
    let mut app = Monitor::new(registry, Duration::from_millis(200));

    let mut terminal = ratatui::init();
    let res = app.run(&mut terminal, |dev| {
        if let Some(dir) = output {
            match save(dev, dir) {
                Ok(path) => log::info!("{} capture written to {}", dev.name(), path.display()),
                Err(e) => log::error!("{} {}", dev.name(), e),
            }
        }
    });
    ratatui::restore();
    res
}

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use starsweep_core::{
    note_name, rms, AppConfig, AudioClock, BackgroundAudifier, FrameDriver, FrameOutcome,
    LineOverlay, ManualClock, Recorder, RecordingVoices, RgbaImage, SessionRequest,
    SpectralType, StaticCatalog, SweepScheduler, SystemClock, WavetableBank,
};
use tracing_subscriber::EnvFilter;

fn main() -> starsweep_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulate(args),
        Commands::Parse { sp_types } => run_parse(&sp_types),
    }
}

fn run_simulate(args: SimulateArgs) -> starsweep_core::Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let image = RgbaImage::load(&args.image)?;
    let catalog = StaticCatalog::load(&args.catalog)?;
    let (width, height) = (image.width(), image.height());
    tracing::info!(
        image = ?args.image,
        width,
        height,
        objects = catalog.len(),
        realtime = args.realtime,
        "starting simulation"
    );

    let manual = ManualClock::new();
    let clock: Arc<dyn AudioClock> = if args.realtime {
        Arc::new(SystemClock::new())
    } else {
        Arc::new(manual.clone())
    };

    let recorder = Recorder::shared();
    let mut scheduler = SweepScheduler::new(
        clock.clone(),
        Box::new(RecordingVoices::new(recorder.clone())),
        &config,
    )?;

    let bank = WavetableBank::new(&config.audifier);
    let audifier = BackgroundAudifier::new(Box::new(bank), clock, config.audifier.clone())?;
    let request = SessionRequest::new(audifier, Box::new(catalog), width, height)
        .with_image(Box::new(image))
        .with_overlay(Box::new(LineOverlay::new(width, height)));
    scheduler.on_start(request)?;

    let mut driver = FrameDriver::new(args.fps);
    match args.cycles {
        Some(cycles) => driver = driver.with_max_cycles(cycles),
        None if config.sweep.looping && !args.realtime => {
            tracing::warn!("looping simulation without --cycles, stopping after one cycle");
            driver = driver.with_max_cycles(1);
        }
        None => {}
    }

    let block = (config.audifier.sample_rate / args.fps.max(1)).max(1) as usize;
    let mut samples = vec![0.0f32; block];
    let mut frames = 0u64;
    let mut loudest = 0.0f32;

    let outcome = driver.run(
        &mut scheduler,
        |interval: Duration| {
            if args.realtime {
                std::thread::sleep(interval);
                Ok(())
            } else {
                manual.advance(interval.as_secs_f64()).map(|_| ())
            }
        },
        |scheduler, outcome| {
            if let FrameOutcome::Advanced { .. } = outcome {
                frames += 1;
                if let Some(audifier) = scheduler.audifier_mut() {
                    audifier.bank_mut().render(&mut samples);
                    loudest = loudest.max(rms(&samples));
                }
            }
            Ok(())
        },
    )?;
    scheduler.on_stop();

    let recorder = recorder
        .lock()
        .map_err(|_| starsweep_core::SonifyError::msg("note recorder has been poisoned"))?;
    tracing::info!(
        ?outcome,
        frames,
        notes = recorder.notes().len(),
        disposed = recorder.disposed_voices(),
        drone_rms = loudest,
        "simulation finished"
    );

    match &args.output {
        Some(path) => recorder.save(path)?,
        None => println!("{}", recorder.to_json()?),
    }
    Ok(())
}

fn run_parse(sp_types: &[String]) -> starsweep_core::Result<()> {
    if sp_types.is_empty() {
        tracing::warn!("no spectral types given");
    }
    for raw in sp_types {
        let spectral = SpectralType::parse(raw);
        let value = starsweep_core::mapping::luminosity_note_value(&spectral);
        println!(
            "{raw}\t{spectral}\tclass={} luminosity={}\tnote={}\t{} ({:.3}s)",
            spectral.spectral_class,
            spectral.luminosity_class,
            note_name(&spectral),
            value,
            value.seconds(starsweep_core::mapping::DEFAULT_BPM),
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sonify a sky image with a sweeping line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep across an image and record the notes that would be played.
    Simulate(SimulateArgs),
    /// Show how spectral type strings map to notes.
    Parse {
        /// Spectral type strings such as `G2V` or `K0III`.
        sp_types: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// PNG, JPEG or PNM image of the sky.
    #[arg(long)]
    image: PathBuf,
    /// JSON array of projected catalog objects.
    #[arg(long)]
    catalog: PathBuf,
    /// Optional JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Stop a looping sweep after this many cycles.
    #[arg(long)]
    cycles: Option<u32>,
    /// Run against the wall clock instead of stepping time per frame.
    #[arg(long)]
    realtime: bool,
    /// Where to write the recorded notes. Printed to stdout otherwise.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

use anyhow::Context;
use clap::Parser;
use generator::profile::{synthesize, GeneratorConfig};
use radcore::{CancelSignal, Collaborators, ExecutionOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::request::RequestArgs;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Runs a radar dataset processing chain")]
struct Args {
    /// Main config file; location and product files are read from its keys
    #[arg(required_unless_present = "synthesize")]
    config: Option<PathBuf>,
    /// Start of the processing window (UTC)
    #[arg(long)]
    start: Option<String>,
    /// End of the processing window (UTC)
    #[arg(long)]
    end: Option<String>,
    /// Free-form tag passed to every stage and product
    #[arg(long, default_value = "")]
    info: String,
    /// Trajectory file bounding the processing window
    #[arg(long)]
    trajectory: Option<PathBuf>,
    /// Keep polling for new volumes until the end time or a stop request
    #[arg(long, default_value_t = false)]
    realtime: bool,
    /// Run the datasets of a level concurrently
    #[arg(long, default_value_t = false)]
    parallel_datasets: bool,
    /// Run the products of a dataset concurrently
    #[arg(long, default_value_t = false)]
    parallel_products: bool,
    /// Seconds to wait between real-time polls that found nothing
    #[arg(long, default_value_t = 1.0)]
    idle_wait: f64,
    /// Write a synthetic data tree and config into DIR, then exit
    #[arg(long, value_name = "DIR")]
    synthesize: Option<PathBuf>,
}

/// Cancels on Ctrl+C. Runs on its own thread with a small runtime.
fn spawn_ctrl_c_listener(cancel: &CancelSignal) -> anyhow::Result<()> {
    let token = cancel.token();
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    thread::Builder::new()
        .name("processor-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                tokio::select! {
                    result = signal::ctrl_c() => match result {
                        Ok(()) => {
                            log::info!("Ctrl+C received, stopping after the current volume");
                            token.cancel();
                        }
                        Err(err) => log::warn!("cannot listen for Ctrl+C: {err}"),
                    },
                    _ = token.cancelled() => {}
                }
            })
        })
        .context("spawning signal listener")?;
    Ok(())
}

fn execute(args: Args) -> anyhow::Result<()> {
    if let Some(dir) = args.synthesize {
        let synthetic = synthesize(&dir, &GeneratorConfig::default())
            .with_context(|| format!("synthesizing data under {}", dir.display()))?;
        println!(
            "Synthetic run written -> config {} window {} .. {}",
            synthetic.config_file.display(),
            synthetic.start.format("%Y%m%d%H%M%S"),
            synthetic.end.format("%Y%m%d%H%M%S")
        );
        return Ok(());
    }

    let config = args.config.context("no config file given")?;
    let request = RequestArgs {
        config,
        start: args.start,
        end: args.end,
        info: args.info,
        trajectory: args.trajectory,
        realtime: args.realtime,
    }
    .into_request()?;

    if !args.idle_wait.is_finite() || args.idle_wait < 0.0 {
        anyhow::bail!("--idle-wait must be a non-negative number of seconds");
    }
    let options = ExecutionOptions {
        parallel_datasets: args.parallel_datasets,
        parallel_products: args.parallel_products,
        idle_wait: Duration::from_secs_f64(args.idle_wait),
    };

    let cancel = CancelSignal::new();
    cancel
        .spawn_stdin_listener()
        .context("starting stdin listener")?;
    spawn_ctrl_c_listener(&cancel)?;
    println!("Press Enter to stop after the current volume.");

    let summary = radcore::run(&request, Collaborators::filesystem(), options, cancel.clone())
        .with_context(|| format!("running {}", request.config_file.display()))?;
    // releases the signal thread
    cancel.cancel();

    println!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

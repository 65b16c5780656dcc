use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ao::mailbox::{Backend, MailboxConfig};
use clap::{ArgAction, Parser};
use example::{timeout, Example};
use log::LevelFilter;
use watchdog::{Watchdog, WatchdogConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs one Example active object through its lifecycle")]
struct Opts {
    /// Parameter carried by Event1.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    param: i32,

    /// Parameter carried by Event2.
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    param2: i32,

    /// Arm a watchdog that raises Event2 after this many milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS")]
    timeout_ms: Option<u32>,

    /// Re-arm the watchdog after every expiry.
    #[arg(long, requires = "timeout_ms")]
    periodic: bool,

    /// Time to leave the object running before stopping it.
    #[arg(long = "wait-ms", value_name = "MS")]
    wait_ms: Option<u64>,

    /// Use a kernel POSIX message queue for the mailbox.
    #[arg(long)]
    posix: bool,

    /// More output: -v info, -vv debug, -vvv trace.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Opts {
    fn backend(&self) -> Backend {
        if self.posix {
            Backend::Posix
        } else {
            Backend::Local
        }
    }

    /// Explicit wait, or long enough for one timeout to fire.
    fn wait(&self) -> Duration {
        let millis = match (self.wait_ms, self.timeout_ms) {
            (Some(ms), _) => ms,
            (None, Some(timeout)) => u64::from(timeout) + 50,
            (None, None) => 0,
        };
        Duration::from_millis(millis)
    }

    fn watchdog(&self) -> Option<WatchdogConfig> {
        let config = WatchdogConfig::from_millis(self.timeout_ms?).name("ExampleWatchdog");
        Some(if self.periodic { config.periodic() } else { config })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    let backend = opts.backend();
    if !backend.is_available() {
        bail!("--posix needs a build with the posix-mq feature on Linux");
    }
    let config = Example::config()
        .mailbox(MailboxConfig::builder().backend(backend).build())
        .build();

    let mut example = Example::with_config(config).context("cannot create the Example object")?;
    log::info!("created {} on {}", example.name(), example.thread_name());
    example.start().context("cannot start the Example object")?;

    example.event_one(opts.param)?;
    example.event_two(opts.param2)?;

    let watchdog = match opts.watchdog() {
        Some(config) => {
            let watchdog = Watchdog::new(config, timeout(example.events()))
                .context("cannot create the watchdog")?;
            watchdog.start()?;
            Some(watchdog)
        }
        None => None,
    };

    let wait = opts.wait();
    if !wait.is_zero() {
        thread::sleep(wait);
    }
    if let Some(watchdog) = watchdog {
        log::info!("watchdog fired {} time(s)", watchdog.fired());
        watchdog.destroy();
    }

    let stopped = example.stop().context("cannot stop the Example object")?;
    println!(
        "{}: final state {:?}, {} dispatches, actions {:?}",
        example.name(),
        stopped.state,
        stopped.dispatched,
        stopped.machine.history
    );
    example.destroy().context("cannot release the Example object")?;
    Ok(())
}

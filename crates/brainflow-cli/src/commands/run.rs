use std::sync::Arc;
use std::time::Duration;

use brainflow_core::{
    AlertPolicy, Config, Database, DomainEvent, EventNode, LifecycleEvent, MemorySnapshotStore,
    ObservableDurations, SinkRouter, SnapshotStore, SoundMap, SystemClock, TimerController,
    TimerDeps, TokioTicker, TracingAlertSink, TracingNotificationSink,
};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args)]
pub struct RunArgs {
    /// Start the countdown right away
    #[arg(long)]
    pub start: bool,
    /// Keep the suspend mark in memory instead of the database
    #[arg(long)]
    pub ephemeral: bool,
}

/// One line typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Start,
    Pause,
    Stop,
    Background,
    Foreground,
    Settings,
    Stats,
    Status,
    Work(u32),
    Quit,
}

const HELP: &str =
    "commands: start | pause | stop | bg | fg | settings | stats | status | work <secs> | quit";

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let input = match command {
        "start" | "s" => Input::Start,
        "pause" | "p" => Input::Pause,
        "stop" | "x" => Input::Stop,
        "bg" | "background" => Input::Background,
        "fg" | "foreground" => Input::Foreground,
        "settings" => Input::Settings,
        "stats" | "statistics" => Input::Stats,
        "status" => Input::Status,
        "work" => {
            let secs = words
                .next()
                .ok_or_else(|| "work needs a length in seconds".to_string())?;
            let secs = secs
                .parse::<u32>()
                .map_err(|_| format!("invalid length: {secs}"))?;
            Input::Work(secs)
        }
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(input))
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(session(args));
    // A pending blocking stdin read must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Config::path()?;
    let config = Config::load_from(&config_path)?;
    let durations = Arc::new(ObservableDurations::file_backed(config_path)?);
    let snapshots: Arc<dyn SnapshotStore> = if args.ephemeral {
        Arc::new(MemorySnapshotStore::new())
    } else {
        Arc::new(Database::open()?)
    };

    let root = EventNode::root("app");
    let sounds = SoundMap {
        tick: config.alerts.tick_sound,
        ..SoundMap::default()
    };
    SinkRouter::new(
        Arc::new(TracingAlertSink::new(sounds)),
        Arc::new(TracingNotificationSink),
        AlertPolicy::from(&config),
    )
    .attach(&root);
    root.on_timer(|event| print_event(event.into()));

    let (ticker, mut ticks) = TokioTicker::channel()?;
    let controller = TimerController::new(
        &root,
        TimerDeps {
            durations: durations.clone(),
            snapshots,
            clock: Arc::new(SystemClock),
        },
        Box::new(ticker),
        config.tick_interval_secs(),
    );

    println!("{}", serde_json::to_string(&controller.status())?);
    if args.start {
        controller.start();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(signal) = ticks.recv() => controller.handle_tick(signal),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(input)) => apply(&controller, &durations, input)?,
                    Ok(None) => {}
                    Err(message) => eprintln!("{message}\n{HELP}"),
                }
            }
        }
    }

    controller.pause();
    Ok(())
}

fn apply(
    controller: &TimerController,
    durations: &ObservableDurations,
    input: Input,
) -> Result<(), Box<dyn std::error::Error>> {
    match input {
        Input::Start => controller.start(),
        Input::Pause => controller.pause(),
        Input::Stop => controller.stop(),
        Input::Background => controller.notify_lifecycle(LifecycleEvent::EnteredBackground),
        Input::Foreground => controller.notify_lifecycle(LifecycleEvent::EnteredForeground),
        Input::Settings => controller.open_settings(),
        Input::Stats => controller.open_statistics(),
        Input::Status => println!("{}", serde_json::to_string(&controller.status())?),
        Input::Work(secs) => {
            if let Err(e) = durations.set_work(secs) {
                tracing::warn!(error = %e, secs, "failed to store work length");
                eprintln!("error: {e}");
            }
        }
        Input::Quit => {}
    }
    Ok(())
}

fn print_event(event: DomainEvent) {
    match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to encode event"),
    }
}

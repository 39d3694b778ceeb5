use std::{
    fs,
    io::{self, BufRead, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use clap::ArgMatches;
use log::{info, warn};
use stemdeck_lib::{
    LoadPhase, Manifest, Player, PlayerError, PlayerSettings, RodioBackend, StateChange,
    TrackLevel,
};

use crate::controls;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STATUS_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(args: &ArgMatches) -> Result<i32, PlayerError> {
    let manifest_path = args
        .get_one::<String>("MANIFEST")
        .ok_or_else(|| PlayerError::InvalidRequest("missing manifest path".to_string()))?;
    let quiet = args.get_flag("quiet");

    let manifest = Manifest::from_path(manifest_path)?;
    if args.get_flag("list") {
        for name in manifest.song_names() {
            println!("{}", name);
        }
        return Ok(0);
    }

    let song = match args.get_one::<String>("song") {
        Some(name) => manifest.song(name)?,
        None => manifest
            .first()
            .ok_or_else(|| PlayerError::Manifest("manifest lists no songs".to_string()))?,
    };
    info!("Selected song \"{}\" ({} stems)", song.name, song.tracks.len());

    let settings = match args.get_one::<String>("settings") {
        Some(path) => read_settings(path)?,
        None => PlayerSettings::default(),
    };

    let player = Player::with_settings(RodioBackend::factory(), settings);
    player.set_base_dir(manifest.base_dir());

    if !quiet {
        player.on_load_progress(|progress| {
            let phase = match progress.phase {
                LoadPhase::Preparing => "preparing",
                LoadPhase::Downloading => "downloading",
                LoadPhase::Decoding => "decoding",
            };
            eprint!(
                "\rLoading {:>3}%  {:<12} {:<24}",
                progress.percentage, phase, progress.current_track_name
            );
            if progress.percentage >= 100 {
                eprintln!();
            }
        });
    }

    let finished = Arc::new(AtomicBool::new(false));
    let finished_flag = finished.clone();
    player.on_state_change(move |change: StateChange| {
        if let Some(error) = &change.error {
            warn!("{}", error);
        }
        if change.is_playing == Some(false) && change.current_time == Some(0.0) {
            finished_flag.store(true, Ordering::SeqCst);
        }
    });

    let levels: Arc<Mutex<Vec<TrackLevel>>> = Arc::new(Mutex::new(Vec::new()));
    if !quiet && !args.get_flag("no-meter") {
        let sink = levels.clone();
        player.on_meter_update(move |update| {
            *sink.lock().unwrap() = update;
        });
    }

    player.load(&song.requests())?;

    if args.get_flag("check") {
        println!("{}  {}", song.name, controls::format_time(player.get_duration()));
        for track in player.tracks() {
            println!("  {}", track.name);
        }
        return Ok(0);
    }

    apply_mix_options(&player, args)?;
    if let Some(seek) = args.get_one::<f64>("seek") {
        player.seek(*seek)?;
    }

    player.play()?;
    finished.store(false, Ordering::SeqCst);

    let commands = spawn_stdin_reader();
    let mut last_status: Option<Instant> = None;

    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match controls::parse_control(&line) {
                Ok(control) => {
                    let stopping = control == controls::Control::Stop;
                    match controls::apply_control(&player, control) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(err) => warn!("{}", err),
                    }
                    if stopping {
                        finished.store(false, Ordering::SeqCst);
                    }
                }
                Err(message) => warn!("{}", message),
            },
            Err(mpsc::RecvTimeoutError::Timeout) | Err(mpsc::RecvTimeoutError::Disconnected) => {}
        }

        if finished.load(Ordering::SeqCst) {
            info!("Reached the end of \"{}\"", song.name);
            break;
        }

        if !quiet && last_status.map_or(true, |at| at.elapsed() >= STATUS_INTERVAL) {
            last_status = Some(Instant::now());
            let status = controls::status_text(
                player.get_current_time(),
                player.get_duration(),
                player.is_playing(),
            );
            let meter = controls::meter_text(&levels.lock().unwrap());
            let mut stdout = io::stdout();
            let _ = write!(stdout, "\r{}  {}", status, meter);
            let _ = stdout.flush();
        }
    }

    if !quiet {
        println!();
    }
    Ok(0)
}

fn read_settings(path: &str) -> Result<PlayerSettings, PlayerError> {
    let text = fs::read_to_string(path).map_err(|err| {
        PlayerError::InvalidRequest(format!("failed to read settings {}: {}", path, err))
    })?;
    serde_json::from_str(&text)
        .map_err(|err| PlayerError::InvalidRequest(format!("invalid settings {}: {}", path, err)))
}

fn apply_mix_options(player: &Player, args: &ArgMatches) -> Result<(), PlayerError> {
    if let Some(specs) = args.get_many::<String>("volume") {
        for spec in specs {
            let (stem, level) =
                controls::parse_volume_spec(spec).map_err(PlayerError::InvalidRequest)?;
            player.set_volume(&stem, level)?;
        }
    }
    if let Some(stems) = args.get_many::<String>("mute") {
        for stem in stems {
            player.toggle_mute(stem)?;
        }
    }
    if let Some(stems) = args.get_many::<String>("solo") {
        for stem in stems {
            player.toggle_solo(stem)?;
        }
    }
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

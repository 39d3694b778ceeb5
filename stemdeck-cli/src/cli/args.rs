//! CLI argument definitions for `stemdeck`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser.
pub fn build_cli() -> Command {
    Command::new("stemdeck")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Adam Howard <adam.thomas.howard@gmail.com>")
        .about("Play the stems of a song in sync, with per-stem mute, solo and volume")
        .arg_required_else_help(true)
        .arg(
            Arg::new("MANIFEST")
                .help("Path to the songs.json manifest")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .short('l')
                .action(ArgAction::SetTrue)
                .help("List the songs in the manifest, then exit"),
        )
        .arg(
            Arg::new("song")
                .long("song")
                .short('S')
                .value_name("NAME")
                .help("Song to play (defaults to the first song in the manifest)"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .conflicts_with("list")
                .help("Load and decode the song, print its stems, then exit without playing"),
        )
        .arg(
            Arg::new("seek")
                .long("seek")
                .short('s')
                .value_name("TIME")
                .value_parser(clap::value_parser!(f64))
                .help("Start playback at the given time in seconds"),
        )
        .arg(
            Arg::new("mute")
                .long("mute")
                .short('m')
                .value_name("STEM")
                .action(ArgAction::Append)
                .help("Mute a stem (repeatable)"),
        )
        .arg(
            Arg::new("solo")
                .long("solo")
                .value_name("STEM")
                .action(ArgAction::Append)
                .help("Solo a stem (repeatable)"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .short('v')
                .value_name("STEM=LEVEL")
                .action(ArgAction::Append)
                .help("Set a stem's volume slider, 0.0-1.5 (repeatable)"),
        )
        .arg(
            Arg::new("settings")
                .long("settings")
                .value_name("PATH")
                .help("Path to a JSON file with player settings"),
        )
        .arg(
            Arg::new("no-meter")
                .long("no-meter")
                .action(ArgAction::SetTrue)
                .help("Do not print stem levels"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Suppress status output and log echo"),
        )
}

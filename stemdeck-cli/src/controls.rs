use stemdeck_lib::{Player, PlayerError, TrackLevel};

const METER_WIDTH: usize = 12;

/// A command typed on stdin while playing.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Toggle,
    Stop,
    Quit,
    Seek(f64),
    Skip(f64),
    Mute(String),
    Solo(String),
    Volume(String, f32),
    Reset,
}

pub fn parse_control(line: &str) -> Result<Control, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Control::Toggle);
    };
    let rest: Vec<&str> = words.collect();
    let stem = || -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("{} needs a stem name", verb))
        } else {
            Ok(rest.join(" "))
        }
    };

    match verb {
        "p" | "play" | "pause" => Ok(Control::Toggle),
        "s" | "stop" => Ok(Control::Stop),
        "q" | "quit" => Ok(Control::Quit),
        "r" | "reset" => Ok(Control::Reset),
        "<" => Ok(Control::Skip(-5.0)),
        ">" => Ok(Control::Skip(5.0)),
        "seek" => rest
            .first()
            .and_then(|value| value.parse::<f64>().ok())
            .map(Control::Seek)
            .ok_or_else(|| "seek needs a time in seconds".to_string()),
        "m" | "mute" => stem().map(Control::Mute),
        "solo" => stem().map(Control::Solo),
        "v" | "volume" => {
            let (level, name) = rest
                .split_last()
                .ok_or_else(|| "volume needs a stem and a level".to_string())?;
            let level = level
                .parse::<f32>()
                .map_err(|_| format!("invalid volume level: {}", level))?;
            if name.is_empty() {
                return Err("volume needs a stem and a level".to_string());
            }
            Ok(Control::Volume(name.join(" "), level))
        }
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Apply `control` to the player. Returns `false` when the CLI should exit.
pub fn apply_control(player: &Player, control: Control) -> Result<bool, PlayerError> {
    match control {
        Control::Toggle => {
            if player.is_playing() {
                player.pause();
            } else {
                player.play()?;
            }
        }
        Control::Stop => player.stop(),
        Control::Quit => {
            player.stop();
            return Ok(false);
        }
        Control::Seek(time) => player.seek(time)?,
        Control::Skip(delta) => {
            let target = (player.get_current_time() + delta).clamp(0.0, player.get_duration());
            player.seek(target)?;
        }
        Control::Mute(stem) => {
            player.toggle_mute(&stem)?;
        }
        Control::Solo(stem) => {
            player.toggle_solo(&stem)?;
        }
        Control::Volume(stem, level) => player.set_volume(&stem, level)?,
        Control::Reset => {
            player.reset_mix();
        }
    }
    Ok(true)
}

/// Parse a `STEM=LEVEL` volume option.
pub fn parse_volume_spec(spec: &str) -> Result<(String, f32), String> {
    let (name, level) = spec
        .rsplit_once('=')
        .ok_or_else(|| format!("expected STEM=LEVEL, got \"{}\"", spec))?;
    let level = level
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid volume level in \"{}\"", spec))?;
    Ok((name.trim().to_string(), level))
}

pub fn status_text(time: f64, duration: f64, playing: bool) -> String {
    let state = if playing { "Playing" } else { "Paused" };
    let percent = if duration > 0.0 {
        (time / duration * 100.0).min(100.0)
    } else {
        0.0
    };
    format!(
        "{:<8}{} / {}   ({:>5.1}%)",
        state,
        format_time(time),
        format_time(duration),
        percent
    )
}

pub fn meter_text(levels: &[TrackLevel]) -> String {
    levels
        .iter()
        .map(|level| {
            let filled = ((level.level.clamp(0.0, 1.0) * METER_WIDTH as f32).round()) as usize;
            format!(
                "{} [{}{}]",
                level.name,
                "#".repeat(filled),
                ".".repeat(METER_WIDTH - filled)
            )
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0).floor() as u64;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_parse() {
        assert_eq!(parse_control(""), Ok(Control::Toggle));
        assert_eq!(parse_control("seek 42.5"), Ok(Control::Seek(42.5)));
        assert_eq!(
            parse_control("mute Lead Vocals"),
            Ok(Control::Mute("Lead Vocals".to_string()))
        );
        assert_eq!(
            parse_control("volume Lead Vocals 0.8"),
            Ok(Control::Volume("Lead Vocals".to_string(), 0.8))
        );
        assert!(parse_control("volume 0.8").is_err());
        assert!(parse_control("solo").is_err());
        assert!(parse_control("dance").is_err());
    }

    #[test]
    fn volume_specs_split_on_the_last_equals() {
        assert_eq!(parse_volume_spec("Bass=0.5"), Ok(("Bass".to_string(), 0.5)));
        assert_eq!(parse_volume_spec("a=b=1"), Ok(("a=b".to_string(), 1.0)));
        assert!(parse_volume_spec("Bass").is_err());
        assert!(parse_volume_spec("Bass=loud").is_err());
    }

    #[test]
    fn status_and_meters_render() {
        assert_eq!(format_time(3_725.9), "01:02:05");
        assert_eq!(
            status_text(30.0, 120.0, true),
            "Playing 00:00:30 / 00:02:00   ( 25.0%)"
        );
        let meter = meter_text(&[
            TrackLevel {
                name: "Bass".to_string(),
                level: 0.5,
            },
            TrackLevel {
                name: "Keys".to_string(),
                level: 0.0,
            },
        ]);
        assert_eq!(meter, "Bass [######......]  Keys [............]");
    }
}

//! Single-line stdin commands

use cadence_playback::{TransportCommand, MAX_RATE, MIN_RATE};
use std::time::Duration;

/// A parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Transport(TransportCommand),
    Quit,
}

/// Help shown for unrecognised input
pub const HELP: &str = "p play/pause | n next | b previous | s shuffle | r repeat | f <secs> seek | v <0-100> volume | x <0.25-8> speed | q quit";

/// Parse one line, `None` if it is not a command
pub fn parse(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let argument = words.next();
    if words.next().is_some() {
        return None;
    }

    let input = match (command, argument) {
        ("p", None) => Input::Transport(TransportCommand::PlayPause),
        ("n", None) => Input::Transport(TransportCommand::Next),
        ("b", None) => Input::Transport(TransportCommand::Previous),
        ("s", None) => Input::Transport(TransportCommand::ToggleShuffle),
        ("r", None) => Input::Transport(TransportCommand::CycleRepeat),
        ("q", None) => Input::Quit,
        ("f", Some(secs)) => {
            let secs: f64 = secs.parse().ok()?;
            if !secs.is_finite() || secs < 0.0 {
                return None;
            }
            Input::Transport(TransportCommand::Seek(Duration::from_secs_f64(secs)))
        }
        ("v", Some(percent)) => {
            let percent: u8 = percent.parse().ok()?;
            if percent > 100 {
                return None;
            }
            Input::Transport(TransportCommand::SetVolume(f32::from(percent) / 100.0))
        }
        ("x", Some(speed)) => {
            let speed: f32 = speed.parse().ok()?;
            if !(MIN_RATE..=MAX_RATE).contains(&speed) {
                return None;
            }
            Input::Transport(TransportCommand::SetSpeed(speed))
        }
        _ => return None,
    };
    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse("p"), Some(Input::Transport(TransportCommand::PlayPause)));
        assert_eq!(parse("  n "), Some(Input::Transport(TransportCommand::Next)));
        assert_eq!(parse("b"), Some(Input::Transport(TransportCommand::Previous)));
        assert_eq!(parse("s"), Some(Input::Transport(TransportCommand::ToggleShuffle)));
        assert_eq!(parse("r"), Some(Input::Transport(TransportCommand::CycleRepeat)));
        assert_eq!(parse("q"), Some(Input::Quit));
    }

    #[test]
    fn seek_takes_fractional_seconds() {
        assert_eq!(
            parse("f 12.5"),
            Some(Input::Transport(TransportCommand::Seek(Duration::from_millis(12_500))))
        );
        assert_eq!(parse("f -3"), None);
        assert_eq!(parse("f"), None);
        assert_eq!(parse("f soon"), None);
    }

    #[test]
    fn volume_is_a_percentage() {
        assert_eq!(
            parse("v 50"),
            Some(Input::Transport(TransportCommand::SetVolume(0.5)))
        );
        assert_eq!(parse("v 101"), None);
        assert_eq!(parse("v"), None);
    }

    #[test]
    fn speed_is_a_multiplier_within_range() {
        assert_eq!(
            parse("x 1.5"),
            Some(Input::Transport(TransportCommand::SetSpeed(1.5)))
        );
        assert_eq!(
            parse("x 0.25"),
            Some(Input::Transport(TransportCommand::SetSpeed(0.25)))
        );
        assert_eq!(parse("x 9"), None);
        assert_eq!(parse("x NaN"), None);
        assert_eq!(parse("x"), None);
    }

    #[test]
    fn unknown_or_malformed_lines_are_ignored() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("x"), None);
        assert_eq!(parse("p now"), None);
        assert_eq!(parse("v 50 60"), None);
    }
}

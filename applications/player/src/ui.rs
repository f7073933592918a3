//! Terminal rendering of player events
//!
//! Queue snapshots arrive on every edit; the view redraws at most once per
//! second with the latest one.

use crate::settings::{SPEED_KEY, VOLUME_KEY};
use cadence_core::SettingsStore;
use cadence_playback::{PlayerEvent, QueueSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

/// Delay between a queue change and its redraw
pub const QUEUE_REDRAW_DELAY: Duration = Duration::from_secs(1);

/// Coalesces queue snapshots into delayed redraws
#[derive(Debug)]
pub struct QueueDebouncer {
    delay: Duration,
    pending: Option<(QueueSnapshot, Instant)>,
}

impl QueueDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record a snapshot; the first one of a burst sets the deadline
    pub fn push(&mut self, snapshot: QueueSnapshot, now: Instant) {
        let deadline = match self.pending.take() {
            Some((_, deadline)) => deadline,
            None => now + self.delay,
        };
        self.pending = Some((snapshot, deadline));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Latest snapshot, once its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<QueueSnapshot> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.pending.take().map(|(snapshot, _)| snapshot),
            _ => None,
        }
    }
}

/// Print events until the transport goes away
///
/// Volume and speed changes are written to `settings`.
pub async fn render_events(
    mut events: broadcast::Receiver<PlayerEvent>,
    settings: Arc<dyn SettingsStore>,
) {
    let mut debouncer = QueueDebouncer::new(QUEUE_REDRAW_DELAY);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            event = events.recv() => match event {
                Ok(PlayerEvent::QueueChanged(snapshot)) => debouncer.push(snapshot, Instant::now()),
                Ok(event) => {
                    persist(settings.as_ref(), &event);
                    if let Some(line) = describe(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event renderer lagged");
                }
                Err(RecvError::Closed) => break,
            },
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(snapshot) = debouncer.take_due(Instant::now()) {
                    println!("{}", describe_queues(&snapshot));
                }
            }
        }
    }
}

/// Store the user-facing values an event carries
pub fn persist(settings: &dyn SettingsStore, event: &PlayerEvent) {
    let (key, value) = match event {
        PlayerEvent::VolumeChanged { volume } => (VOLUME_KEY, serde_json::json!(volume)),
        PlayerEvent::SpeedChanged { speed } => (SPEED_KEY, serde_json::json!(speed)),
        _ => return,
    };
    if let Err(e) = settings.set(key, value) {
        tracing::warn!(key, error = %e, "Failed to persist setting");
    }
}

/// One-line rendering of an event, `None` for events with no line of their own
pub fn describe(event: &PlayerEvent) -> Option<String> {
    let line = match event {
        PlayerEvent::StateChanged { state } => format!("[{state:?}]"),
        PlayerEvent::TrackChanged { track, gapless, .. } => {
            let handoff = if *gapless { " (gapless)" } else { "" };
            format!("▶ {}{}", track.file_name(), handoff)
        }
        PlayerEvent::NextTrackScheduled { track, start_at } => format!(
            "  next: {} at {:.2}s",
            track.file_name(),
            start_at.as_duration().as_secs_f64()
        ),
        PlayerEvent::ModesChanged { shuffle, repeat } => {
            format!("shuffle {} | repeat {repeat}", if *shuffle { "on" } else { "off" })
        }
        PlayerEvent::VolumeChanged { volume } => format!("volume {:.0}%", volume * 100.0),
        PlayerEvent::SpeedChanged { speed } => format!("speed {speed:.2}x"),
        PlayerEvent::DecodeFailed {
            track,
            message,
            missing_file,
        } => {
            if *missing_file {
                format!("! missing file: {track}")
            } else {
                format!("! could not decode {}: {message}", track.file_name())
            }
        }
        PlayerEvent::Stopped => "[stopped]".to_string(),
        PlayerEvent::QueueChanged(_) => return None,
    };
    Some(line)
}

/// Summary of the three queues
pub fn describe_queues(snapshot: &QueueSnapshot) -> String {
    let upcoming: Vec<String> = snapshot
        .manual
        .iter()
        .chain(snapshot.automatic.iter())
        .take(3)
        .map(|track| track.file_name())
        .collect();

    format!(
        "queue: {} manual, {} automatic, {} played | up next: {}",
        snapshot.manual.len(),
        snapshot.automatic.len(),
        snapshot.history.len(),
        if upcoming.is_empty() {
            "-".to_string()
        } else {
            upcoming.join(", ")
        }
    )
}

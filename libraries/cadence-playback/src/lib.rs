//! Cadence - Playback Core
//!
//! Queue management, gapless scheduling and transport control for Cadence.
//!
//! This crate provides:
//! - Three queues (manual "play next", automatic, history)
//! - Automatic queue refill from view order, shuffle or repeat (set / file)
//! - A sample-clocked scheduler that starts the next track on the exact
//!   frame the current one ends, at an adjustable playback rate
//! - A transport controller reducing user intents to queue and scheduler
//!   transitions, emitting [`PlayerEvent`]s after each one
//!
//! # Architecture
//!
//! `cadence-playback` never touches audio hardware:
//! - Audio devices sit behind the [`AudioOutput`] trait (see `cadence-output`)
//! - [`OfflineOutput`] is a manually clocked implementation for headless use
//!   and tests
//! - Decoding goes through `cadence-decoder`'s gateway and sample cache
//!
//! All playback state lives in one [`PlaybackSession`] owned by the
//! [`Transport`]; there are no globals.
//!
//! # Example: Queue Resolution
//!
//! ```rust
//! use cadence_core::TrackRef;
//! use cadence_playback::{Origin, PlaybackSession, QueueManager, RepeatMode};
//!
//! let mut queues = QueueManager::default();
//! let mut session = PlaybackSession::new();
//! queues.set_view(vec![TrackRef::from("/music/a.flac"), TrackRef::from("/music/b.flac")]);
//!
//! queues.begin_track(&mut session, TrackRef::from("/music/a.flac"), Origin::View);
//! queues.enqueue(TrackRef::from("/music/x.flac"));
//!
//! // Manual queue wins over the automatic queue...
//! let (next, _) = queues.resolve_next(&session).unwrap();
//! assert_eq!(next, TrackRef::from("/music/x.flac"));
//!
//! // ...unless repeat = file
//! session.repeat = RepeatMode::File;
//! let (next, _) = queues.resolve_next(&session).unwrap();
//! assert_eq!(next, TrackRef::from("/music/a.flac"));
//! ```
//!
//! # Example: Transport
//!
//! ```rust,no_run
//! use cadence_decoder::{DecoderConfig, DecoderGateway, SampleCache};
//! use cadence_playback::{OfflineOutput, PlaybackConfig, Transport, TransportCommand};
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let (output, output_events) = OfflineOutput::new();
//! let gateway = DecoderGateway::builder(DecoderConfig::default(), SampleCache::default()).build();
//! let transport = Transport::new(PlaybackConfig::default(), gateway, output);
//!
//! let (commands, receiver) = mpsc::channel(32);
//! tokio::spawn(transport.run(receiver, output_events));
//!
//! commands.send(TransportCommand::PlayPause).await.ok();
//! # }
//! ```

mod error;
mod events;
mod offline;
mod output;
mod queue;
mod scheduler;
mod session;
mod shuffle;
mod transport;
pub mod types;

// Public exports
pub use error::{PlaybackError, Result};
pub use events::{PlayerEvent, QueueSnapshot};
pub use offline::{OfflineOutput, SourceRecord};
pub use output::{
    clock_frames, source_frames, AudioOutput, ClockTime, OutputEvent, SourceId, SourceRequest,
    MAX_RATE, MIN_RATE,
};
pub use queue::QueueManager;
pub use scheduler::{ActiveSource, Scheduler, ScheduledSource, SourceEnd};
pub use session::PlaybackSession;
pub use shuffle::shuffled_excluding;
pub use transport::{Transport, TransportCommand};
pub use types::{Origin, PlaybackConfig, QueueKind, RepeatMode, SchedulerState};

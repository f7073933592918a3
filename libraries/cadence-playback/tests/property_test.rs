//! Property-based tests for the queue manager
//!
//! Uses proptest to check queue invariants across random views and random
//! sequences of user actions.

use cadence_core::{DecodedBuffer, TrackRef};
use cadence_decoder::SampleCache;
use cadence_playback::{
    shuffled_excluding, Origin, PlaybackConfig, PlaybackSession, QueueKind, QueueManager,
    RepeatMode,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// ===== Helpers =====

fn view_of(len: usize) -> Vec<TrackRef> {
    (0..len)
        .map(|i| TrackRef::new(format!("/music/{:03}.flac", i)))
        .collect()
}

#[derive(Debug, Clone)]
enum Action {
    PlayFromView(usize),
    AdvanceAutomatic,
    AdvanceManual,
    Enqueue(usize),
    PlayNext(usize),
    RemoveAutomatic(usize),
    ToggleShuffle,
    SetRepeat(RepeatMode),
    StepBack,
}

fn arbitrary_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0usize..64).prop_map(Action::PlayFromView),
        Just(Action::AdvanceAutomatic),
        Just(Action::AdvanceManual),
        (0usize..64).prop_map(Action::Enqueue),
        (0usize..64).prop_map(Action::PlayNext),
        (0usize..64).prop_map(Action::RemoveAutomatic),
        Just(Action::ToggleShuffle),
        prop_oneof![
            Just(RepeatMode::Off),
            Just(RepeatMode::Set),
            Just(RepeatMode::File)
        ]
        .prop_map(Action::SetRepeat),
        Just(Action::StepBack),
    ]
}

fn apply(
    manager: &mut QueueManager,
    session: &mut PlaybackSession,
    view: &[TrackRef],
    action: Action,
) {
    match action {
        Action::PlayFromView(i) => {
            manager.begin_track(session, view[i % view.len()].clone(), Origin::View)
        }
        Action::AdvanceAutomatic => {
            if let Some((track, origin)) = manager.resolve_next(session) {
                manager.begin_track(session, track, origin);
            }
        }
        Action::AdvanceManual => {
            if let Some(track) = manager.manual().front().cloned() {
                manager.begin_track(session, track, Origin::Manual);
            }
        }
        Action::Enqueue(i) => manager.enqueue(view[i % view.len()].clone()),
        Action::PlayNext(i) => manager.play_next(view[i % view.len()].clone()),
        Action::RemoveAutomatic(i) => {
            let len = manager.automatic().len();
            if len > 0 {
                manager.remove(session, QueueKind::Automatic, i % len);
            }
        }
        Action::ToggleShuffle => {
            session.shuffle = !session.shuffle;
            manager.on_shuffle_changed(session);
        }
        Action::SetRepeat(mode) => {
            session.repeat = mode;
            manager.on_repeat_changed(session);
        }
        Action::StepBack => {
            if let Some(track) = manager.step_back(session) {
                manager.begin_track(session, track, Origin::History);
            }
        }
    }
}

// ===== Property Tests =====

proptest! {
    /// Shuffling a view yields exactly its tracks minus the current one
    #[test]
    fn shuffle_is_a_permutation_of_the_view(
        len in 1usize..200,
        current in proptest::option::of(0usize..200),
        seed in any::<u64>(),
    ) {
        let view = view_of(len);
        let current = current.map(|i| view[i % len].clone());
        let exclude: HashSet<&TrackRef> = current.iter().collect();

        let shuffled = shuffled_excluding(&view, &exclude, &mut StdRng::seed_from_u64(seed));

        let expected: HashSet<&TrackRef> =
            view.iter().filter(|track| Some(*track) != current.as_ref()).collect();
        let actual: HashSet<&TrackRef> = shuffled.iter().collect();

        prop_assert_eq!(shuffled.len(), expected.len());
        prop_assert_eq!(actual, expected);
    }

    /// The automatic queue never grows past its cap
    #[test]
    fn automatic_queue_respects_cap(
        len in 1usize..80,
        cap in 1usize..50,
        actions in prop::collection::vec(arbitrary_action(), 1..60),
    ) {
        let view = view_of(len);
        let mut manager = QueueManager::new(&PlaybackConfig {
            automatic_queue_cap: cap,
            ..Default::default()
        });
        let mut session = PlaybackSession::new();
        manager.set_view(view.clone());

        for action in actions {
            apply(&mut manager, &mut session, &view, action);
            prop_assert!(manager.automatic().len() <= cap);
        }
    }

    /// Under repeat = file, "next" is always the current track
    #[test]
    fn repeat_file_beats_manual_queue(
        len in 2usize..40,
        manual in prop::collection::vec(0usize..40, 1..10),
        start in 0usize..40,
    ) {
        let view = view_of(len);
        let mut manager = QueueManager::default();
        let mut session = PlaybackSession::new();
        manager.set_view(view.clone());
        let current = view[start % len].clone();
        manager.begin_track(&mut session, current.clone(), Origin::View);
        for i in manual {
            manager.enqueue(view[i % len].clone());
        }

        session.repeat = RepeatMode::File;
        manager.on_repeat_changed(&session);

        prop_assert_eq!(
            manager.resolve_next(&session),
            Some((current, Origin::RepeatFile))
        );
    }

    /// Eviction never removes the current track or anything queued
    #[test]
    fn eviction_spares_active_tracks(
        len in 1usize..60,
        actions in prop::collection::vec(arbitrary_action(), 1..40),
    ) {
        let view = view_of(len);
        let mut manager = QueueManager::new(&PlaybackConfig {
            automatic_queue_cap: 10,
            ..Default::default()
        });
        let mut session = PlaybackSession::new();
        manager.set_view(view.clone());
        for action in actions {
            apply(&mut manager, &mut session, &view, action);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let active = manager.active_set(&session);
        let (survivors, evicted) = runtime.block_on(async {
            let cache = SampleCache::default();
            for track in &view {
                cache.put(track.clone(), Arc::new(DecodedBuffer::silence(16)));
            }
            tokio::time::advance(SampleCache::DEFAULT_RETENTION + Duration::from_secs(1)).await;
            let evicted = cache.evict_stale(&active);
            let survivors: HashSet<TrackRef> =
                view.iter().filter(|track| cache.contains(track)).cloned().collect();
            (survivors, evicted)
        });

        for track in &active {
            prop_assert!(survivors.contains(track), "active track {} was evicted", track);
        }
        prop_assert_eq!(evicted.len() + survivors.len(), view.len());
        prop_assert!(evicted.iter().all(|track| !active.contains(track)));
    }
}

//! Unit tests for records, the registry and the indicator engine.
//!
//! Collaborators are the in-memory fakes from `testing`; nothing here
//! touches D-Bus or the filesystem.

#![allow(clippy::unwrap_used)]

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use futures::StreamExt;
use zbus::zvariant::{OwnedValue, Value};

use super::{
    ActivityKey, Capabilities, CoverArt, CoverImage, FetchError, IconRef, IndicatorEvent, IndicatorInput,
    InputOutcome, Key, MediaError, MprisIndicator, NameChange, OPACITY_BASE, OPACITY_FULL,
    OPACITY_HOVER, PlaybackState, PlayerId, PlayerRecord, PointerButton, Registry, RowInput,
    ScrollDirection, SourceChange, SourceOrigin, TrackMetadata, classify_name_change, is_tracked,
    pick_by_activity,
    service::Config,
    testing::{Command, FakeSource, Harness, WindowAction},
    window::{WindowEvent, WindowId},
};

const VLC: &str = "org.mpris.MediaPlayer2.vlc";
const SPOTIFY: &str = "org.mpris.MediaPlayer2.spotify";

fn origin(pid: u32) -> SourceOrigin {
    SourceOrigin {
        pid: Some(pid),
        owner: None,
    }
}

fn track(artist: &str, cover: Option<&str>, mimetype: Option<&str>) -> SourceChange {
    SourceChange::Track {
        artist: artist.to_string(),
        title: "Song".to_string(),
        cover_uri: cover.map(str::to_string),
        mimetype_icon: mimetype.map(str::to_string),
    }
}

mod record {
    use super::*;

    #[test]
    fn commands_are_gated_on_capabilities() {
        let h = Harness::new();
        let source = FakeSource::new(VLC).capabilities(Capabilities::NEXT);
        let commands = source.commands();
        let record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);

        assert!(!record.previous());
        assert!(!record.play_pause_or_stop());
        assert!(record.next());
        assert_eq!(*commands.lock().unwrap(), vec![Command::Next]);
    }

    #[test]
    fn capability_changes_are_mirrored() {
        let h = Harness::new();
        let source = FakeSource::new(VLC).capabilities(Capabilities::empty());
        let mut record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);
        assert!(!record.previous());

        record.apply(
            SourceChange::Capabilities {
                capabilities: Capabilities::PREVIOUS,
                can_pause: true,
            },
            0,
            &h.ctx,
        );

        assert!(record.previous());
    }

    #[test]
    fn refresh_icon_reports_only_real_changes() {
        let h = Harness::new();
        let source = FakeSource::new(VLC).desktop_entry("vlc");
        let mut record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);
        assert_eq!(record.icon(), &IconRef::generic_audio());

        assert!(!record.refresh_icon(&h.ctx));

        h.icons.install("vlc-symbolic");
        assert!(record.refresh_icon(&h.ctx));
        assert!(!record.refresh_icon(&h.ctx));
        assert_eq!(record.icon(), &IconRef::symbolic("vlc-symbolic"));
    }

    #[test]
    fn icon_chain_prefers_symbolic_then_application_then_mimetype() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let app_icon = IconRef::File(PathBuf::from("/usr/share/pixmaps/vlc.png"));
        h.windows.with(|table| {
            table.icons.insert(app.clone(), app_icon.clone());
        });

        let source = FakeSource::new(VLC)
            .identity("VLC media player")
            .desktop_entry("vlc");
        let mut record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);
        assert_eq!(record.icon(), &app_icon);

        h.icons.install("vlc-symbolic");
        assert!(record.refresh_icon(&h.ctx));
        assert_eq!(record.icon(), &IconRef::symbolic("vlc-symbolic"));
    }

    #[test]
    fn mimetype_hint_is_used_without_anything_better() {
        let h = Harness::new();
        let mut record = PlayerRecord::new(FakeSource::new(VLC).boxed(), origin(1), 0, &h.ctx);

        let update = record.apply(
            track("Artist", None, Some("video-x-generic-symbolic")),
            0,
            &h.ctx,
        );

        assert!(update.icon_changed);
        assert_eq!(record.icon(), &IconRef::symbolic("video-x-generic-symbolic"));
    }

    #[test]
    fn spotify_client_icon_is_tried() {
        let h = Harness::new();
        h.icons.install("spotify-client-symbolic");
        let source = FakeSource::new(SPOTIFY).desktop_entry("spotify");
        let record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);

        assert_eq!(record.icon(), &IconRef::symbolic("spotify-client-symbolic"));
    }

    #[test]
    fn fallback_cover_follows_record_icon() {
        let h = Harness::new();
        let source = FakeSource::new(VLC).desktop_entry("vlc");
        let mut record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);

        h.icons.install("vlc-symbolic");
        record.refresh_icon(&h.ctx);

        assert_eq!(
            record.cover().image(),
            &CoverImage::Icon(IconRef::symbolic("vlc-symbolic"))
        );
    }

    #[test]
    fn status_changed_at_never_decreases() {
        let h = Harness::new();
        let mut record = PlayerRecord::new(FakeSource::new(VLC).boxed(), origin(1), 2, &h.ctx);

        let update = record.apply(SourceChange::Playback(PlaybackState::Playing), 5, &h.ctx);
        assert!(update.ranking_changed);
        assert_eq!(record.status_changed_at(), 5);

        record.apply(SourceChange::Playback(PlaybackState::Paused), 3, &h.ctx);
        assert_eq!(record.status_changed_at(), 5);
        assert_eq!(record.playback_rank(), 1);

        let unchanged = record.apply(SourceChange::Playback(PlaybackState::Paused), 9, &h.ctx);
        assert!(!unchanged.ranking_changed);
        assert_eq!(record.status_changed_at(), 5);
    }

    #[test]
    fn desktop_entry_change_resolves_application() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);

        let mut record = PlayerRecord::new(FakeSource::new(VLC).boxed(), origin(42), 0, &h.ctx);
        assert!(!record.has_application());

        let update = record.apply(SourceChange::DesktopEntry("vlc".to_string()), 0, &h.ctx);

        assert!(update.ranking_changed);
        assert!(record.has_application());
        assert!(record.focused());
    }

    #[test]
    fn activation_time_survives_losing_the_application() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);
        let source = FakeSource::new(VLC).desktop_entry("vlc");
        let mut record = PlayerRecord::new(source.boxed(), origin(42), 0, &h.ctx);
        assert_eq!(record.last_activated(), 10);

        let update = record.apply(
            SourceChange::DesktopEntry("org.videolan.unknown".to_string()),
            0,
            &h.ctx,
        );

        assert!(update.ranking_changed);
        assert!(!record.has_application());
        assert!(!record.focused());
        assert_eq!(record.last_activated(), 10);

        h.windows.set_focus(window, false, 4);
        record.apply(SourceChange::DesktopEntry("vlc".to_string()), 0, &h.ctx);
        assert!(record.has_application());
        assert_eq!(record.last_activated(), 10);
    }

    #[test]
    fn metadata_changes_leave_ranking_alone() {
        let h = Harness::new();
        let mut record = PlayerRecord::new(FakeSource::new(VLC).boxed(), origin(1), 0, &h.ctx);

        let update = record.apply(track("Artist", None, None), 3, &h.ctx);
        assert!(!update.ranking_changed);

        let update = record.apply(SourceChange::Identity("VLC".to_string()), 4, &h.ctx);
        assert!(!update.ranking_changed);
    }

    #[test]
    fn presentation_fields_follow_playback() {
        let h = Harness::new();
        let mut record = PlayerRecord::new(FakeSource::new(VLC).boxed(), origin(1), 0, &h.ctx);
        assert_eq!(record.play_pause_icon_name(), "media-playback-start-symbolic");
        assert!(!record.show_stop());

        record.apply(SourceChange::Playback(PlaybackState::Playing), 1, &h.ctx);
        assert_eq!(record.play_pause_icon_name(), "media-playback-pause-symbolic");
        assert!(record.show_stop());

        record.apply(
            SourceChange::Capabilities {
                capabilities: Capabilities::all(),
                can_pause: false,
            },
            1,
            &h.ctx,
        );
        assert_eq!(record.play_pause_icon_name(), "media-playback-stop-symbolic");
        assert!(!record.show_stop());
    }

    #[test]
    fn accessible_name_is_empty_when_artist_fell_back() {
        let h = Harness::new();
        let source = FakeSource::new(VLC).identity("VLC");
        let mut record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);

        record.apply(track("VLC", None, None), 0, &h.ctx);
        assert_eq!(record.accessible_name(), "");

        record.apply(track("Nina Simone", None, None), 0, &h.ctx);
        assert_eq!(record.accessible_name(), "VLC");
        assert_eq!(record.artist(), "Nina Simone");
        assert_eq!(record.title(), "Song");
    }

    #[test]
    fn identity_change_carries_fallback_artist_along() {
        let h = Harness::new();
        let source = FakeSource::new(VLC).identity("VLC");
        let mut record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);
        record.apply(track("VLC", None, None), 0, &h.ctx);

        record.apply(SourceChange::Identity("VLC media player".to_string()), 0, &h.ctx);

        assert_eq!(record.artist(), "VLC media player");
        assert_eq!(record.accessible_name(), "");

        record.apply(track("Nina Simone", None, None), 0, &h.ctx);
        record.apply(SourceChange::Identity("VLC".to_string()), 0, &h.ctx);

        assert_eq!(record.artist(), "Nina Simone");
        assert_eq!(record.accessible_name(), "VLC");
    }

    #[test]
    fn activation_without_application_raises_player() {
        let h = Harness::new();
        let source = FakeSource::new(VLC);
        let commands = source.commands();
        let record = PlayerRecord::new(source.boxed(), origin(1), 0, &h.ctx);

        assert!(record.activate_or_minimize(true, h.windows.as_ref()));
        assert_eq!(*commands.lock().unwrap(), vec![Command::Raise]);
        assert!(h.windows.actions().is_empty());
    }

    #[test]
    fn self_destruct_is_reported() {
        let h = Harness::new();
        let mut record = PlayerRecord::new(FakeSource::new(VLC).boxed(), origin(1), 0, &h.ctx);

        assert!(record.apply(SourceChange::SelfDestruct, 0, &h.ctx).destroyed);
    }
}

mod cover {
    use super::*;

    fn cover(h: &Harness) -> CoverArt {
        let source = FakeSource::new(VLC);
        CoverArt::new(
            source.id(),
            source.key(),
            Arc::clone(&h.ctx.loader),
            h.ctx.events.clone(),
        )
    }

    #[test]
    fn starts_on_dimmed_fallback() {
        let h = Harness::new();
        let cover = cover(&h);

        assert_eq!(cover.image(), &CoverImage::Icon(IconRef::generic_audio()));
        assert_eq!(cover.opacity(), OPACITY_BASE);
        assert!(!cover.is_fetching());
    }

    #[test]
    fn hover_brightens_symbolic_fallback_only() {
        let h = Harness::new();
        let mut cover = cover(&h);

        cover.on_parent_hover(true);
        assert_eq!(cover.opacity(), OPACITY_HOVER);
        cover.on_parent_hover(false);
        assert_eq!(cover.opacity(), OPACITY_BASE);

        cover.set_fallback_icon(IconRef::File(PathBuf::from("/tmp/app.png")));
        cover.on_parent_hover(true);
        assert_eq!(cover.opacity(), OPACITY_FULL);
    }

    #[tokio::test]
    async fn successful_fetch_shows_art_at_full_opacity() {
        let mut h = Harness::new();
        let mut cover = cover(&h);

        cover.set_target(Some("file:///art.png"));
        assert!(cover.is_fetching());

        let (_, _, generation, result) = h.next_cover().await;
        assert!(cover.complete(generation, result));
        assert_eq!(
            cover.image(),
            &CoverImage::Art(Arc::from("file:///art.png".as_bytes()))
        );
        assert_eq!(cover.opacity(), OPACITY_FULL);

        cover.on_parent_hover(true);
        assert_eq!(cover.opacity(), OPACITY_FULL);
    }

    #[tokio::test]
    async fn superseded_fetch_never_changes_the_image() {
        let mut h = Harness::new();
        let mut cover = cover(&h);

        cover.set_target(Some("pending://a"));
        let first = cover.generation();
        cover.set_target(Some("file:///b.png"));

        assert!(!cover.complete(first, Ok(Arc::from("a".as_bytes()))));
        assert!(!cover.complete(first, Err(FetchError::TimedOut("a".into()))));
        assert_eq!(cover.image(), &CoverImage::Icon(IconRef::generic_audio()));

        let (_, _, generation, result) = h.next_cover().await;
        assert_ne!(generation, first);
        assert!(cover.complete(generation, result));
        assert_eq!(
            cover.image(),
            &CoverImage::Art(Arc::from("file:///b.png".as_bytes()))
        );
    }

    #[tokio::test]
    async fn failure_falls_back_to_icon() {
        let mut h = Harness::new();
        let mut cover = cover(&h);

        cover.set_target(Some("file:///a.png"));
        let (_, _, generation, result) = h.next_cover().await;
        cover.complete(generation, result);

        cover.set_target(Some("fail://b"));
        let (_, _, generation, result) = h.next_cover().await;
        assert!(cover.complete(generation, result));
        assert_eq!(cover.image(), &CoverImage::Icon(IconRef::generic_audio()));
        assert_eq!(cover.opacity(), OPACITY_BASE);
    }

    #[tokio::test]
    async fn cancellation_is_not_a_failure() {
        let mut h = Harness::new();
        let mut cover = cover(&h);

        cover.set_target(Some("file:///a.png"));
        let (_, _, generation, result) = h.next_cover().await;
        cover.complete(generation, result);

        cover.set_target(Some("cancel://b"));
        let (_, _, generation, result) = h.next_cover().await;
        assert!(!cover.complete(generation, result));
        assert_eq!(
            cover.image(),
            &CoverImage::Art(Arc::from("file:///a.png".as_bytes()))
        );
    }

    #[tokio::test]
    async fn clearing_the_target_shows_fallback_immediately() {
        let mut h = Harness::new();
        let mut cover = cover(&h);

        cover.set_target(Some("file:///a.png"));
        let (_, _, generation, result) = h.next_cover().await;
        cover.complete(generation, result);

        cover.set_target(None);
        assert!(!cover.is_fetching());
        assert_eq!(cover.image(), &CoverImage::Icon(IconRef::generic_audio()));

        cover.set_target(Some(""));
        assert!(!cover.is_fetching());
    }
}

mod arbiter {
    use super::*;

    fn key(focused: bool, playback_rank: u8, last_activated: u64, status_changed_at: u64) -> ActivityKey {
        ActivityKey {
            focused,
            playback_rank,
            last_activated,
            status_changed_at,
        }
    }

    #[test]
    fn empty_input_picks_nothing() {
        let keys: Vec<ActivityKey> = Vec::new();
        assert_eq!(pick_by_activity(&keys, |k| *k), None);
    }

    #[test]
    fn picks_lexicographic_maximum_of_distinct_keys() {
        let mut keys = Vec::new();
        for focused in [false, true] {
            for rank in 0..3 {
                for last in [0, 50, 100] {
                    for status in [1, 2] {
                        keys.push(key(focused, rank, last, status));
                    }
                }
            }
        }

        for rotation in 0..keys.len() {
            let mut rotated = keys.clone();
            rotated.rotate_left(rotation);
            let expected = rotated.iter().max().copied();
            assert_eq!(pick_by_activity(&rotated, |k| *k).copied(), expected);
        }
    }

    #[test]
    fn focus_dominates_playback() {
        let focused_stopped = key(true, 0, 0, 0);
        let playing = key(false, 2, 500, 500);
        let keys = [playing, focused_stopped];

        assert_eq!(pick_by_activity(&keys, |k| *k), Some(&focused_stopped));
    }

    #[test]
    fn recent_activation_breaks_playback_tie() {
        let a = key(false, 2, 100, 1);
        let b = key(false, 2, 50, 9);
        let keys = [b, a];

        assert_eq!(pick_by_activity(&keys, |k| *k), Some(&a));
    }

    #[test]
    fn identical_keys_keep_first() {
        let items = [("first", key(false, 1, 0, 0)), ("second", key(false, 1, 0, 0))];

        assert_eq!(
            pick_by_activity(&items, |(_, k)| *k).map(|(name, _)| *name),
            Some("first")
        );
    }
}

mod registry {
    use super::*;

    fn registry(h: &Harness) -> Registry {
        Registry::new(h.ctx.clone(), true)
    }

    fn active(registry: &Registry) -> Option<String> {
        registry
            .pick_active()
            .map(|record| record.id().bus_name().to_string())
    }

    #[test]
    fn empty_registry_is_hidden() {
        let h = Harness::new();
        let registry = registry(&h);

        assert!(registry.is_empty());
        assert_eq!(active(&registry), None);
        assert_eq!(registry.indicator_icon(), None);
    }

    #[test]
    fn appearing_player_becomes_active() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let source = FakeSource::new(VLC);
        let id = source.id();

        registry.source_appeared(source.boxed(), origin(1));

        assert_eq!(
            registry.take_events(),
            vec![
                IndicatorEvent::PlayerAdded(id.clone()),
                IndicatorEvent::ActiveChanged(Some(id)),
            ]
        );
        assert_eq!(registry.indicator_icon(), Some(IconRef::generic_audio()));
    }

    #[test]
    fn one_record_per_live_id() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let vlc = PlayerId::from_bus_name(VLC);

        registry.source_appeared(FakeSource::new(VLC).boxed(), origin(1));
        registry.source_appeared(FakeSource::new(SPOTIFY).boxed(), origin(2));
        registry.source_appeared(FakeSource::new(VLC).boxed(), origin(3));
        assert_eq!(registry.len(), 2);

        registry.source_vanished(&vlc);
        assert_eq!(registry.len(), 1);
        registry.source_vanished(&vlc);
        assert_eq!(registry.len(), 1);

        registry.owner_changed(FakeSource::new(SPOTIFY).boxed(), origin(4));
        assert_eq!(registry.len(), 1);

        registry.source_appeared(FakeSource::new(VLC).boxed(), origin(5));
        let ids: Vec<&str> = registry.players().map(|r| r.id().bus_name()).collect();
        assert_eq!(ids, vec![SPOTIFY, VLC]);
    }

    #[test]
    fn vanish_then_appear_releases_old_record() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let old = FakeSource::new(VLC);
        let old_commands = old.commands();

        registry.source_appeared(old.boxed(), origin(10));
        registry.source_vanished(&PlayerId::from_bus_name(VLC));
        assert_eq!(Arc::strong_count(&old_commands), 1);

        registry.source_appeared(FakeSource::new(VLC).boxed(), origin(20));

        assert_eq!(registry.len(), 1);
        let record = registry.get(&PlayerId::from_bus_name(VLC)).unwrap();
        assert_eq!(record.pid(), Some(20));
    }

    #[test]
    fn owner_change_replaces_without_active_flicker() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let id = PlayerId::from_bus_name(VLC);
        registry.source_appeared(FakeSource::new(VLC).boxed(), origin(10));
        registry.take_events();

        registry.owner_changed(FakeSource::new(VLC).boxed(), origin(20));

        assert_eq!(
            registry.take_events(),
            vec![
                IndicatorEvent::PlayerRemoved(id.clone()),
                IndicatorEvent::PlayerAdded(id.clone()),
            ]
        );
        assert_eq!(registry.get(&id).unwrap().pid(), Some(20));
    }

    #[test]
    fn changes_from_replaced_source_are_dropped() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let old = FakeSource::new(VLC);
        let old_key = old.key();
        let id = old.id();
        registry.source_appeared(old.boxed(), origin(10));
        registry.owner_changed(FakeSource::new(VLC).boxed(), origin(20));

        registry.on_source_change(&id, old_key, SourceChange::Playback(PlaybackState::Playing));
        registry.on_source_change(&id, old_key, SourceChange::SelfDestruct);

        let record = registry.get(&id).unwrap();
        assert_eq!(record.playback(), PlaybackState::Stopped);
    }

    #[test]
    fn self_destruct_removes_record() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let source = FakeSource::new(VLC);
        let (id, key) = (source.id(), source.key());
        registry.source_appeared(source.boxed(), origin(1));
        registry.take_events();

        registry.on_source_change(&id, key, SourceChange::SelfDestruct);

        assert!(registry.is_empty());
        assert_eq!(
            registry.take_events(),
            vec![
                IndicatorEvent::PlayerRemoved(id),
                IndicatorEvent::ActiveChanged(None),
            ]
        );
    }

    #[test]
    fn focused_player_beats_playing_one() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        let mut registry = registry(&h);

        registry.source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(42));
        registry.source_appeared(FakeSource::new(SPOTIFY).playing().boxed(), origin(7));
        assert_eq!(active(&registry).as_deref(), Some(SPOTIFY));

        h.windows.set_focus(window, true, 100);
        registry.on_window_event(&WindowEvent::FocusChanged(window));

        assert_eq!(active(&registry).as_deref(), Some(VLC));
    }

    #[test]
    fn recently_activated_player_wins_among_equals() {
        let h = Harness::new();
        let first_app = h.windows.add_app("first.desktop", "First");
        let second_app = h.windows.add_app("second.desktop", "Second");
        let first_window = h.windows.add_window(&first_app, 1, 1);
        let second_window = h.windows.add_window(&second_app, 2, 2);
        let mut registry = registry(&h);

        let first = FakeSource::new("org.mpris.MediaPlayer2.first").desktop_entry("first").playing();
        let second = FakeSource::new("org.mpris.MediaPlayer2.second").desktop_entry("second").playing();
        registry.source_appeared(first.boxed(), origin(1));
        registry.source_appeared(second.boxed(), origin(2));

        for (window, time) in [(first_window, 100), (second_window, 50)] {
            h.windows.set_focus(window, true, time);
            registry.on_window_event(&WindowEvent::FocusChanged(window));
            h.windows.set_focus(window, false, time);
            registry.on_window_event(&WindowEvent::FocusChanged(window));
        }

        assert_eq!(active(&registry).as_deref(), Some("org.mpris.MediaPlayer2.first"));
    }

    #[test]
    fn latest_status_change_breaks_final_tie() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let vlc = FakeSource::new(VLC).playing();
        let (id, key) = (vlc.id(), vlc.key());
        registry.source_appeared(vlc.boxed(), origin(1));
        registry.source_appeared(FakeSource::new(SPOTIFY).playing().boxed(), origin(2));
        assert_eq!(active(&registry).as_deref(), Some(SPOTIFY));

        registry.on_source_change(&id, key, SourceChange::Playback(PlaybackState::Paused));
        registry.on_source_change(&id, key, SourceChange::Playback(PlaybackState::Playing));

        assert_eq!(active(&registry).as_deref(), Some(VLC));
    }

    #[test]
    fn window_removal_drops_focus_boost() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);
        let mut registry = registry(&h);
        registry.source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(42));
        registry.source_appeared(FakeSource::new(SPOTIFY).playing().boxed(), origin(7));
        assert_eq!(active(&registry).as_deref(), Some(VLC));

        h.windows.remove_window(window);
        registry.on_window_event(&WindowEvent::WindowRemoved(window));

        assert_eq!(active(&registry).as_deref(), Some(SPOTIFY));
    }

    #[test]
    fn theme_change_republishes_icons() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let id = PlayerId::from_bus_name(VLC);
        registry.source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(1));
        registry.take_events();

        registry.on_theme_changed();
        assert!(registry.take_events().is_empty());

        h.icons.install("vlc-symbolic");
        registry.on_theme_changed();

        assert_eq!(registry.take_events(), vec![IndicatorEvent::IconChanged(id)]);
        assert_eq!(
            registry.indicator_icon(),
            Some(IconRef::symbolic("vlc-symbolic"))
        );
    }

    #[tokio::test]
    async fn cover_completion_for_old_source_is_ignored() {
        let mut h = Harness::new();
        let mut registry = registry(&h);
        let id = PlayerId::from_bus_name(VLC);
        registry.source_appeared(FakeSource::new(VLC).cover("file:///old.png").boxed(), origin(1));
        let (_, old_key, old_generation, old_result) = h.next_cover().await;

        registry.owner_changed(FakeSource::new(VLC).boxed(), origin(2));
        registry.on_cover_loaded(&id, old_key, old_generation, old_result);

        let view = registry.views().remove(0);
        assert!(!view.has_cover_art);
    }

    #[tokio::test]
    async fn cover_completion_marks_icon_changed() {
        let mut h = Harness::new();
        let mut registry = registry(&h);
        let id = PlayerId::from_bus_name(VLC);
        registry.source_appeared(FakeSource::new(VLC).cover("file:///art.png").boxed(), origin(1));
        registry.take_events();

        let (cover_id, key, generation, result) = h.next_cover().await;
        registry.on_cover_loaded(&cover_id, key, generation, result);

        assert_eq!(registry.take_events(), vec![IndicatorEvent::IconChanged(id)]);
        assert!(registry.views()[0].has_cover_art);
        assert_eq!(h.loader.requests(), vec!["file:///art.png".to_string()]);
    }

    #[test]
    fn row_hover_reaches_cover() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let id = PlayerId::from_bus_name(VLC);
        registry.source_appeared(FakeSource::new(VLC).boxed(), origin(1));

        registry.on_row_hover(&id, true);

        assert_eq!(registry.views()[0].cover_opacity, OPACITY_HOVER);
    }

    #[test]
    fn clear_releases_everything() {
        let h = Harness::new();
        let mut registry = registry(&h);
        let source = FakeSource::new(VLC);
        let commands = source.commands();
        registry.source_appeared(source.boxed(), origin(1));
        registry.take_events();

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(Arc::strong_count(&commands), 1);
        assert_eq!(
            registry.take_events(),
            vec![
                IndicatorEvent::PlayerRemoved(PlayerId::from_bus_name(VLC)),
                IndicatorEvent::ActiveChanged(None),
            ]
        );
    }
}

mod input {
    use super::*;

    fn consumed() -> InputOutcome {
        InputOutcome {
            consumed: true,
            close_menu: false,
        }
    }

    #[test]
    fn empty_registry_propagates_everything() {
        let h = Harness::new();
        let registry = Registry::new(h.ctx.clone(), true);

        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Middle)),
            InputOutcome::PROPAGATE
        );
    }

    #[test]
    fn indicator_buttons_and_scroll_drive_active_player() {
        let h = Harness::new();
        let mut registry = Registry::new(h.ctx.clone(), true);
        let source = FakeSource::new(VLC);
        let commands = source.commands();
        registry.source_appeared(source.boxed(), origin(1));

        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Middle)),
            consumed()
        );
        assert_eq!(
            registry.on_input(IndicatorInput::Scroll(ScrollDirection::Up)),
            consumed()
        );
        assert_eq!(
            registry.on_input(IndicatorInput::Scroll(ScrollDirection::Down)),
            consumed()
        );
        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Primary)),
            InputOutcome::PROPAGATE
        );
        assert_eq!(
            registry.on_input(IndicatorInput::Scroll(ScrollDirection::Left)),
            InputOutcome::PROPAGATE
        );

        assert_eq!(
            *commands.lock().unwrap(),
            vec![Command::PlayPauseOrStop, Command::Previous, Command::Next]
        );
    }

    #[test]
    fn unavailable_command_propagates() {
        let h = Harness::new();
        let mut registry = Registry::new(h.ctx.clone(), true);
        let source = FakeSource::new(VLC).capabilities(Capabilities::empty());
        registry.source_appeared(source.boxed(), origin(1));

        assert_eq!(
            registry.on_input(IndicatorInput::Scroll(ScrollDirection::Up)),
            InputOutcome::PROPAGATE
        );
    }

    #[test]
    fn media_keys_need_control() {
        let h = Harness::new();
        let mut registry = Registry::new(h.ctx.clone(), true);
        let source = FakeSource::new(VLC);
        let commands = source.commands();
        registry.source_appeared(source.boxed(), origin(1));

        let press = |key, ctrl| IndicatorInput::KeyPress { key, ctrl };
        assert_eq!(registry.on_input(press(Key::Space, false)), InputOutcome::PROPAGATE);
        assert_eq!(registry.on_input(press(Key::Space, true)), consumed());
        assert_eq!(registry.on_input(press(Key::Left, true)), consumed());
        assert_eq!(registry.on_input(press(Key::Right, true)), consumed());
        assert_eq!(registry.on_input(press(Key::Other, true)), InputOutcome::PROPAGATE);

        assert_eq!(
            *commands.lock().unwrap(),
            vec![Command::PlayPauseOrStop, Command::Previous, Command::Next]
        );
    }

    #[test]
    fn secondary_click_raises_unfocused_player_and_closes_menu() {
        let h = Harness::new();
        let mut registry = Registry::new(h.ctx.clone(), true);
        let source = FakeSource::new(VLC);
        let commands = source.commands();
        registry.source_appeared(source.boxed(), origin(1));

        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Secondary)),
            InputOutcome {
                consumed: true,
                close_menu: true,
            }
        );
        assert_eq!(*commands.lock().unwrap(), vec![Command::Raise]);
    }

    #[test]
    fn secondary_click_propagates_when_player_cannot_raise() {
        let h = Harness::new();
        let mut registry = Registry::new(h.ctx.clone(), true);
        let source =
            FakeSource::new(VLC).capabilities(Capabilities::all().difference(Capabilities::RAISE));
        let commands = source.commands();
        registry.source_appeared(source.boxed(), origin(1));

        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Secondary)),
            InputOutcome::PROPAGATE
        );
        assert!(commands.lock().unwrap().is_empty());
    }

    #[test]
    fn secondary_click_minimizes_focused_player() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);
        let mut registry = Registry::new(h.ctx.clone(), true);
        registry.source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(42));

        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Secondary)),
            consumed()
        );
        assert_eq!(h.windows.actions(), vec![WindowAction::Minimize(window)]);
    }

    #[test]
    fn minimizing_can_be_disabled() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);
        let mut registry = Registry::new(h.ctx.clone(), false);
        registry.source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(42));

        assert_eq!(
            registry.on_input(IndicatorInput::Button(PointerButton::Secondary)),
            InputOutcome::PROPAGATE
        );
        assert!(h.windows.actions().is_empty());
    }

    #[test]
    fn row_input_targets_its_own_player() {
        let h = Harness::new();
        let mut registry = Registry::new(h.ctx.clone(), true);
        let vlc = FakeSource::new(VLC);
        let spotify = FakeSource::new(SPOTIFY).playing();
        let vlc_commands = vlc.commands();
        let spotify_commands = spotify.commands();
        registry.source_appeared(vlc.boxed(), origin(1));
        registry.source_appeared(spotify.boxed(), origin(2));
        let vlc_id = PlayerId::from_bus_name(VLC);

        assert_eq!(registry.on_row_input(&vlc_id, RowInput::Next), consumed());
        assert_eq!(
            registry.on_row_input(&vlc_id, RowInput::Activate),
            InputOutcome {
                consumed: true,
                close_menu: true,
            }
        );
        assert_eq!(
            registry.on_row_input(&PlayerId::from_bus_name("org.mpris.MediaPlayer2.gone"), RowInput::Next),
            InputOutcome::PROPAGATE
        );

        assert_eq!(*vlc_commands.lock().unwrap(), vec![Command::Next, Command::Raise]);
        assert!(spotify_commands.lock().unwrap().is_empty());
    }

    #[test]
    fn row_activation_never_minimizes() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);
        let mut registry = Registry::new(h.ctx.clone(), true);
        registry.source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(42));

        registry.on_row_input(&PlayerId::from_bus_name(VLC), RowInput::Activate);

        assert!(h.windows.actions().is_empty());
    }
}

mod metadata {
    use super::*;

    fn owned(value: Value<'_>) -> OwnedValue {
        OwnedValue::try_from(value).unwrap()
    }

    #[test]
    fn artist_lists_are_joined() {
        let mut map = HashMap::new();
        map.insert("xesam:artist".to_string(), owned(Value::from(vec!["A", "B"])));
        map.insert("xesam:title".to_string(), owned(Value::from("Title")));
        map.insert(
            "mpris:artUrl".to_string(),
            owned(Value::from("file:///cover.jpg")),
        );

        let metadata = TrackMetadata::from(&map);

        assert_eq!(metadata.artist.as_deref(), Some("A, B"));
        assert_eq!(metadata.title.as_deref(), Some("Title"));
        assert_eq!(metadata.art_url.as_deref(), Some("file:///cover.jpg"));
    }

    #[test]
    fn missing_fields_fall_back() {
        let change = TrackMetadata::default().into_change("Player");

        assert_eq!(
            change,
            SourceChange::Track {
                artist: "Player".to_string(),
                title: String::new(),
                cover_uri: None,
                mimetype_icon: None,
            }
        );
    }

    #[test]
    fn empty_art_url_means_no_cover() {
        let metadata = TrackMetadata {
            art_url: Some(String::new()),
            ..TrackMetadata::default()
        };

        let SourceChange::Track { cover_uri, .. } = metadata.into_change("Player") else {
            panic!("expected a track change");
        };
        assert_eq!(cover_uri, None);
    }

    #[test]
    fn mimetype_follows_url_extension() {
        let with_url = |url: &str| TrackMetadata {
            url: Some(url.to_string()),
            ..TrackMetadata::default()
        };

        assert_eq!(
            with_url("file:///films/clip.MKV").mimetype_icon().as_deref(),
            Some("video-x-generic-symbolic")
        );
        assert_eq!(
            with_url("https://host/track.flac?token=1").mimetype_icon().as_deref(),
            Some("audio-x-generic-symbolic")
        );
        assert_eq!(with_url("https://host/stream").mimetype_icon(), None);
    }
}

mod engine {
    use tokio::sync::oneshot;

    use super::*;

    fn indicator(h: &Harness) -> MprisIndicator {
        MprisIndicator::new(
            Config::default(),
            h.windows.clone(),
            h.icons.clone(),
            h.loader.clone(),
        )
    }

    async fn settle(indicator: &MprisIndicator) {
        indicator
            .send_input(IndicatorInput::Button(PointerButton::Primary))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publishes_players_and_active_player() {
        let h = Harness::new();
        let indicator = indicator(&h);
        let notifier = indicator.notifier();
        assert!(!indicator.is_visible());

        notifier
            .source_appeared(FakeSource::new(VLC).boxed(), origin(1))
            .unwrap();
        notifier
            .source_appeared(FakeSource::new(SPOTIFY).playing().boxed(), origin(2))
            .unwrap();
        settle(&indicator).await;

        assert!(indicator.is_visible());
        assert_eq!(indicator.players().len(), 2);
        assert_eq!(
            indicator.active_player().map(|view| view.id),
            Some(PlayerId::from_bus_name(SPOTIFY))
        );

        indicator.stop().await;
    }

    #[tokio::test]
    async fn broadcasts_indicator_events() {
        let h = Harness::new();
        let indicator = indicator(&h);
        let events = indicator.events();
        tokio::pin!(events);

        indicator
            .notifier()
            .source_appeared(FakeSource::new(VLC).boxed(), origin(1))
            .unwrap();

        let id = PlayerId::from_bus_name(VLC);
        assert_eq!(events.next().await, Some(IndicatorEvent::PlayerAdded(id.clone())));
        assert_eq!(events.next().await, Some(IndicatorEvent::ActiveChanged(Some(id))));

        indicator.stop().await;
    }

    #[tokio::test]
    async fn routes_input_to_active_player() {
        let h = Harness::new();
        let indicator = indicator(&h);
        let source = FakeSource::new(VLC);
        let commands = source.commands();
        indicator
            .notifier()
            .source_appeared(source.boxed(), origin(1))
            .unwrap();

        let outcome = indicator
            .send_input(IndicatorInput::Button(PointerButton::Middle))
            .await
            .unwrap();
        assert!(outcome.consumed);

        let outcome = indicator
            .send_row_input(PlayerId::from_bus_name(VLC), RowInput::Previous)
            .await
            .unwrap();
        assert!(outcome.consumed);
        assert_eq!(
            *commands.lock().unwrap(),
            vec![Command::PlayPauseOrStop, Command::Previous]
        );

        indicator.stop().await;
    }

    #[tokio::test]
    async fn window_notifications_reach_records() {
        let h = Harness::new();
        let app = h.windows.add_app("vlc.desktop", "VLC media player");
        let indicator = indicator(&h);
        let notifier = indicator.notifier();
        notifier
            .source_appeared(FakeSource::new(VLC).desktop_entry("vlc").boxed(), origin(42))
            .unwrap();
        notifier
            .source_appeared(FakeSource::new(SPOTIFY).playing().boxed(), origin(7))
            .unwrap();

        let window = h.windows.add_window(&app, 1, 42);
        h.windows.set_focus(window, true, 10);
        notifier.windows_changed(app).unwrap();
        settle(&indicator).await;

        let active = indicator.active_player().unwrap();
        assert_eq!(active.id, PlayerId::from_bus_name(VLC));
        assert!(active.focused);

        notifier.window_removed(WindowId(1)).unwrap();
        settle(&indicator).await;
        assert_eq!(
            indicator.active_player().map(|view| view.id),
            Some(PlayerId::from_bus_name(SPOTIFY))
        );

        indicator.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_players_and_ends_engine() {
        let h = Harness::new();
        let indicator = indicator(&h);
        let source = FakeSource::new(VLC).cover("pending://art");
        let commands = source.commands();
        indicator
            .notifier()
            .source_appeared(source.boxed(), origin(1))
            .unwrap();
        settle(&indicator).await;

        indicator.stop().await;

        assert_eq!(Arc::strong_count(&commands), 1);
        assert!(indicator.players().is_empty());
        assert!(!indicator.is_visible());
        assert!(matches!(
            indicator
                .send_input(IndicatorInput::Button(PointerButton::Middle))
                .await,
            Err(MediaError::EngineStopped)
        ));
        assert!(matches!(
            indicator.notifier().theme_changed(),
            Err(MediaError::EngineStopped)
        ));

        indicator.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_player_discovery() {
        let h = Harness::new();
        let mut indicator = indicator(&h);
        let (held, mut released) = oneshot::channel::<()>();
        indicator.attach_discovery(tokio::spawn(async move {
            let _held = held;
            futures::future::pending::<()>().await;
        }));

        indicator.stop().await;

        assert_eq!(released.try_recv(), Err(oneshot::error::TryRecvError::Closed));
    }
}

mod discovery {
    use super::*;

    const OWNER: &str = ":1.42";

    fn classify(name: &str, had_owner: bool, new_owner: Option<&str>) -> Option<NameChange> {
        classify_name_change(name, had_owner, new_owner.map(str::to_string), &[])
    }

    #[test]
    fn first_owner_means_appeared() {
        assert_eq!(
            classify(VLC, false, Some(OWNER)),
            Some(NameChange::Appeared {
                id: PlayerId::from_bus_name(VLC),
                owner: OWNER.to_string(),
            })
        );
    }

    #[test]
    fn lost_owner_means_vanished() {
        assert_eq!(
            classify(VLC, true, None),
            Some(NameChange::Vanished(PlayerId::from_bus_name(VLC)))
        );
    }

    #[test]
    fn replaced_owner_means_owner_changed() {
        assert_eq!(
            classify(VLC, true, Some(OWNER)),
            Some(NameChange::OwnerChanged {
                id: PlayerId::from_bus_name(VLC),
                owner: OWNER.to_string(),
            })
        );
    }

    #[test]
    fn signal_without_owners_is_ignored() {
        assert_eq!(classify(VLC, false, None), None);
    }

    #[test]
    fn non_player_names_are_ignored() {
        assert_eq!(classify("org.freedesktop.Notifications", false, Some(OWNER)), None);
        assert_eq!(classify(":1.7", true, None), None);
    }

    #[test]
    fn ignore_patterns_match_anywhere_in_the_name() {
        let ignored = vec!["chromium".to_string()];
        let chromium = "org.mpris.MediaPlayer2.chromium.instance123";

        assert!(!is_tracked(chromium, &ignored));
        assert!(is_tracked(VLC, &ignored));
        assert_eq!(
            classify_name_change(chromium, false, Some(OWNER.to_string()), &ignored),
            None
        );
        assert_eq!(
            classify_name_change(chromium, true, None, &ignored),
            None
        );
    }
}

//! Deferred loading of video items.
//!
//! A video gets a watcher when it is appended. Only when the host reports it
//! near the viewport is its source attached, metadata first. If playable data
//! has not arrived by the fallback deadline the load is escalated once to a
//! full preload, followed by a seek to a short preview offset. Every seek and
//! the first decoded frame end in a pause, so the item shows a still frame.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::state::data::{Item, ItemKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preload {
    Metadata,
    Auto,
}

/// How much of the media the host has buffered, mirroring media element ready states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Nothing,
    Metadata,
    CurrentData,
}

/// Media element events the host forwards for hydrated items
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: Option<f64> },
    LoadedData,
    Seeked,
}

/// Instruction for the host's media element
#[derive(Debug, Clone, PartialEq)]
pub enum HydrationStep {
    Load { src: String, preload: Preload },
    SeekPreview { at_secs: f64 },
    /// Pause at the current frame
    Freeze,
}

/// Preview seek target: 2% of the duration clamped to [0.02, 0.1] seconds
pub fn preview_time(duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if duration.is_finite() && duration > 0.0 => (duration * 0.02).clamp(0.02, 0.1),
        _ => 0.1,
    }
}

#[derive(Debug, Clone)]
struct Load {
    src: String,
    ready: ReadyState,
    duration: Option<f64>,
    fallback_at: Option<Instant>,
    kick_at: Option<Instant>,
    froze_first_frame: bool,
}

#[derive(Debug, Clone)]
pub struct MediaHydrator {
    fallback: Duration,
    kick: Duration,
    /// Watched video items and their sources, not yet near-visible
    watching: HashMap<ItemKey, String>,
    /// Items whose source has been attached
    loads: HashMap<ItemKey, Load>,
    hydrated: HashSet<ItemKey>,
}

impl MediaHydrator {
    pub fn new(fallback: Duration, kick: Duration) -> Self {
        Self {
            fallback,
            kick,
            watching: HashMap::new(),
            loads: HashMap::new(),
            hydrated: HashSet::new(),
        }
    }

    /// Start watching a video item. Returns true when a new watcher was created.
    pub fn watch(&mut self, item: &Item) -> bool {
        if !item.is_video() || self.hydrated.contains(&item.key) || self.watching.contains_key(&item.key) {
            return false;
        }
        let Some(src) = item.media_source() else {
            return false;
        };

        self.watching.insert(item.key.clone(), src.to_string());
        true
    }

    pub fn is_watching(&self, key: &ItemKey) -> bool {
        self.watching.contains_key(key)
    }

    pub fn is_hydrated(&self, key: &ItemKey) -> bool {
        self.hydrated.contains(key)
    }

    /// The item came within the hydration margin
    pub fn near_visible(&mut self, key: &ItemKey, now: Instant) -> Option<HydrationStep> {
        let src = self.watching.remove(key)?;

        self.hydrated.insert(key.clone());
        self.loads.insert(
            key.clone(),
            Load {
                src: src.clone(),
                ready: ReadyState::Nothing,
                duration: None,
                fallback_at: Some(now + self.fallback),
                kick_at: None,
                froze_first_frame: false,
            },
        );
        Some(HydrationStep::Load { src, preload: Preload::Metadata })
    }

    pub fn on_event(&mut self, key: &ItemKey, event: MediaEvent) -> Option<HydrationStep> {
        let load = self.loads.get_mut(key)?;

        match event {
            MediaEvent::LoadedMetadata { duration } => {
                load.ready = load.ready.max(ReadyState::Metadata);
                load.duration = duration;
                (load.ready >= ReadyState::CurrentData)
                    .then(|| HydrationStep::SeekPreview { at_secs: preview_time(load.duration) })
            }
            MediaEvent::LoadedData => {
                load.ready = ReadyState::CurrentData;
                if load.froze_first_frame {
                    return None;
                }
                load.froze_first_frame = true;
                Some(HydrationStep::Freeze)
            }
            MediaEvent::Seeked => Some(HydrationStep::Freeze),
        }
    }

    /// Fire due fallback and preview-kick timers
    pub fn poll(&mut self, now: Instant) -> Vec<(ItemKey, HydrationStep)> {
        let mut steps = Vec::new();

        for (key, load) in self.loads.iter_mut() {
            if load.fallback_at.is_some_and(|deadline| deadline <= now) {
                load.fallback_at = None;
                if load.ready < ReadyState::CurrentData {
                    // Reloading restarts buffering on the host side
                    load.ready = ReadyState::Nothing;
                    load.kick_at = Some(now + self.kick);
                    steps.push((key.clone(), HydrationStep::Load { src: load.src.clone(), preload: Preload::Auto }));
                }
            }

            if load.kick_at.is_some_and(|deadline| deadline <= now) {
                load.kick_at = None;
                if load.ready >= ReadyState::CurrentData {
                    steps.push((key.clone(), HydrationStep::SeekPreview { at_secs: preview_time(load.duration) }));
                }
            }
        }

        steps
    }

    /// Drop all watchers and pending timers. Attached sources stay hydrated.
    pub fn release_all(&mut self) {
        self.watching.clear();
        for load in self.loads.values_mut() {
            load.fallback_at = None;
            load.kick_at = None;
        }
    }

    /// Forget everything, used when the render list is cleared
    pub fn clear(&mut self) {
        self.watching.clear();
        self.loads.clear();
        self.hydrated.clear();
    }
}

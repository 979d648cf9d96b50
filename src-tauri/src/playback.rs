use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// A playable WAV artifact, addressed by its `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioClip {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Whatever actually renders audio (the webview's audio element on desktop).
pub trait PlaybackSink: Send + Sync {
    fn play(&self, clip: &AudioClip);
    /// Holds the current position.
    fn pause(&self);
    /// Continues from where `pause` left off.
    fn resume(&self);
    fn stop(&self);
    /// The clip ran to its end (or the renderer gave up on it).
    fn ended(&self);
    fn state(&self) -> PlaybackState;

    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }
}

/// Owned handle around a sink. Dropping the handle stops playback.
pub struct PlaybackHandle {
    sink: Box<dyn PlaybackSink>,
}

impl PlaybackHandle {
    pub fn new(sink: impl PlaybackSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    pub fn play(&self, clip: &AudioClip) {
        self.sink.stop();
        self.sink.play(clip);
    }

    /// No-op unless something is playing.
    pub fn pause(&self) {
        if self.sink.state() == PlaybackState::Playing {
            self.sink.pause();
        }
    }

    /// No-op unless paused.
    pub fn resume(&self) {
        if self.sink.state() == PlaybackState::Paused {
            self.sink.resume();
        }
    }

    pub fn stop(&self) {
        if self.sink.state() != PlaybackState::Stopped {
            debug!("stopping playback");
        }
        self.sink.stop();
    }

    pub fn ended(&self) {
        self.sink.ended();
    }

    pub fn state(&self) -> PlaybackState {
        self.sink.state()
    }

    pub fn is_playing(&self) -> bool {
        self.sink.is_playing()
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

/// Sink that only tracks state. Used headless and in tests.
#[derive(Debug, Default)]
pub struct TrackedPlayback {
    state: Mutex<PlaybackState>,
    plays: AtomicUsize,
    stops: AtomicUsize,
}

impl TrackedPlayback {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn set(&self, state: PlaybackState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

impl PlaybackSink for TrackedPlayback {
    fn play(&self, _clip: &AudioClip) {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.set(PlaybackState::Playing);
    }

    fn pause(&self) {
        self.set(PlaybackState::Paused);
    }

    fn resume(&self) {
        self.set(PlaybackState::Playing);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.set(PlaybackState::Stopped);
    }

    fn ended(&self) {
        self.set(PlaybackState::Stopped);
    }

    fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: PlaybackSink + ?Sized> PlaybackSink for std::sync::Arc<T> {
    fn play(&self, clip: &AudioClip) {
        (**self).play(clip)
    }

    fn pause(&self) {
        (**self).pause()
    }

    fn resume(&self) {
        (**self).resume()
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn ended(&self) {
        (**self).ended()
    }

    fn state(&self) -> PlaybackState {
        (**self).state()
    }
}

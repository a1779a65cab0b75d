//! Two state playback poller.
//!
//! StreamElements' own "is the player running" endpoint can't be trusted, so
//! playback is inferred: the song loaded in the player counts as playing until it
//! shows up as the most recent history entry.

use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::error::Error;
use crate::media_key::MediaKeys;

/// Read-only queries against the song request queue
#[allow(async_fn_in_trait)]
pub trait PlaybackSource {
    /// Id of the song loaded in the player
    async fn current_id(&self) -> Result<Option<String>, Error>;
    /// Id of the most recently finished song
    async fn last_history_id(&self) -> Result<Option<String>, Error>;
    /// Next song waiting in the queue
    async fn next_song(&self) -> Result<Option<Value>, Error>;
}

#[allow(async_fn_in_trait)]
pub trait ChatSink {
    async fn send_chat(&self, message: &str) -> Result<(), Error>;
}

impl<T: ChatSink + ?Sized> ChatSink for &T {
    async fn send_chat(&self, message: &str) -> Result<(), Error> {
        (**self).send_chat(message).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Idle,
}

impl PlaybackState {
    pub fn from_playing(playing: bool) -> Self {
        if playing {
            Self::Playing
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The player finished its song
    Stopped,
    /// A queued song was skipped into the player
    Started,
}

/// Something is playing when the player holds a song that is not also the last
/// history entry. An empty player is never playing.
pub fn is_playing(current: Option<&str>, last_history: Option<&str>) -> bool {
    match current {
        Some(current) => last_history != Some(current),
        None => false,
    }
}

pub struct Poller<S, C, K> {
    source: S,
    chat: C,
    keys: K,
    skip_command: String,
    poll_interval: Duration,
    toggle_delay: Duration,
    state: Option<PlaybackState>,
}

impl<S: PlaybackSource, C: ChatSink, K: MediaKeys> Poller<S, C, K> {
    pub fn new(source: S, chat: C, keys: K, config: &Config) -> Self {
        Self {
            source,
            chat,
            keys,
            skip_command: config.skip_command.clone(),
            poll_interval: config.poll_interval(),
            toggle_delay: config.toggle_delay(),
            state: None,
        }
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.state
    }

    pub async fn get_playing_state(&self) -> Result<bool, Error> {
        let current = self.source.current_id().await?;
        let last = self.source.last_history_id().await?;
        Ok(is_playing(current.as_deref(), last.as_deref()))
    }

    /// Query once to find the starting state
    pub async fn start(&mut self) -> Result<PlaybackState, Error> {
        let state = PlaybackState::from_playing(self.get_playing_state().await?);
        match state {
            PlaybackState::Playing => println!("Video is playing"),
            PlaybackState::Idle => println!("No video playing"),
        }
        self.state = Some(state);
        Ok(state)
    }

    /// One iteration of the loop, without the cadence delay.
    ///
    /// On a failed query the state is left as it was.
    pub async fn step(&mut self) -> Result<Option<Transition>, Error> {
        let state = match self.state {
            Some(state) => state,
            None => self.start().await?,
        };

        match state {
            PlaybackState::Playing => {
                if self.get_playing_state().await? {
                    return Ok(None);
                }

                self.state = Some(PlaybackState::Idle);
                println!("No video playing");
                tokio::time::sleep(self.toggle_delay).await;
                self.keys.play_pause();
                Ok(Some(Transition::Stopped))
            }
            PlaybackState::Idle => {
                if self.source.next_song().await?.is_none() {
                    return Ok(None);
                }

                println!("Video in queue");
                self.chat.send_chat(&self.skip_command).await?;
                println!("Skip message sent");
                self.state = Some(PlaybackState::Playing);
                self.keys.play_pause();
                Ok(Some(Transition::Started))
            }
        }
    }

    /// Poll until an error occurs
    pub async fn run(&mut self) -> Result<(), Error> {
        if self.state.is_none() {
            self.start().await?;
        }

        loop {
            if let Some(transition) = self.step().await? {
                log::debug!("Playback transition: {transition:?}");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    /// Replays scripted answers, repeating the last one when a script runs dry
    #[derive(Default)]
    struct FakeSource {
        current: Mutex<VecDeque<Option<&'static str>>>,
        history: Mutex<VecDeque<Option<&'static str>>>,
        next: Mutex<VecDeque<Option<Value>>>,
        next_queried_at: Mutex<Vec<Instant>>,
        fail_queries: Mutex<bool>,
    }

    fn pop<T: Clone>(queue: &Mutex<VecDeque<T>>) -> T {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    impl FakeSource {
        fn new(current: &[Option<&'static str>], history: &[Option<&'static str>], next: &[Option<Value>]) -> Self {
            Self {
                current: Mutex::new(current.iter().cloned().collect()),
                history: Mutex::new(history.iter().cloned().collect()),
                next: Mutex::new(next.iter().cloned().collect()),
                next_queried_at: Mutex::new(Vec::new()),
                fail_queries: Mutex::new(false),
            }
        }
    }

    impl PlaybackSource for FakeSource {
        async fn current_id(&self) -> Result<Option<String>, Error> {
            if *self.fail_queries.lock().unwrap() {
                return Err(Error::custom("connection reset"));
            }
            Ok(pop(&self.current).map(str::to_string))
        }

        async fn last_history_id(&self) -> Result<Option<String>, Error> {
            Ok(pop(&self.history).map(str::to_string))
        }

        async fn next_song(&self) -> Result<Option<Value>, Error> {
            if *self.fail_queries.lock().unwrap() {
                return Err(Error::custom("connection reset"));
            }
            self.next_queried_at.lock().unwrap().push(Instant::now());
            Ok(pop(&self.next))
        }
    }

    #[derive(Default)]
    struct FakeChat {
        sent: Mutex<Vec<String>>,
    }

    impl ChatSink for FakeChat {
        async fn send_chat(&self, message: &str) -> Result<(), Error> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeKeys {
        presses: Mutex<usize>,
        pressed_at: Mutex<Vec<Instant>>,
    }

    impl MediaKeys for FakeKeys {
        fn play_pause(&self) {
            *self.presses.lock().unwrap() += 1;
            self.pressed_at.lock().unwrap().push(Instant::now());
        }
    }

    fn config() -> Config {
        Config {
            poll_interval_secs: 1,
            toggle_delay_secs: 0,
            ..Config::default()
        }
    }

    fn song() -> Option<Value> {
        Some(serde_json::json!({ "_id": "queued", "title": "Queued song" }))
    }

    #[test]
    fn different_ids_are_playing() {
        assert!(is_playing(Some("A"), Some("B")));
    }

    #[test]
    fn current_without_history_is_playing() {
        assert!(is_playing(Some("A"), None));
    }

    #[test]
    fn empty_player_is_never_playing() {
        assert!(!is_playing(None, None));
        assert!(!is_playing(None, Some("B")));
    }

    #[test]
    fn finished_song_is_not_playing() {
        assert!(!is_playing(Some("A"), Some("A")));
    }

    #[tokio::test]
    async fn playing_state_scenarios() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let cases = [
            (Some("A"), Some("B"), true),
            (None, None, false),
            (Some("A"), Some("A"), false),
        ];
        for (current, last, expected) in cases {
            let source = FakeSource::new(&[current], &[last], &[None]);
            let poller = Poller::new(source, &chat, &keys, &config());
            assert_eq!(poller.get_playing_state().await.unwrap(), expected, "{current:?} / {last:?}");
        }
    }

    #[tokio::test]
    async fn playing_stays_playing_while_queue_says_so() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[Some("A")], &[Some("B")], &[song()]);
        let mut poller = Poller::new(source, &chat, &keys, &config());

        assert_eq!(poller.start().await.unwrap(), PlaybackState::Playing);
        for _ in 0..3 {
            assert_eq!(poller.step().await.unwrap(), None);
        }
        assert_eq!(poller.state(), Some(PlaybackState::Playing));
        assert_eq!(*keys.presses.lock().unwrap(), 0);
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn playing_to_idle_presses_once() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[Some("A"), Some("A")], &[Some("B"), Some("A")], &[None]);
        let mut poller = Poller::new(source, &chat, &keys, &config());

        assert_eq!(poller.start().await.unwrap(), PlaybackState::Playing);
        assert_eq!(poller.step().await.unwrap(), Some(Transition::Stopped));
        assert_eq!(poller.state(), Some(PlaybackState::Idle));
        assert_eq!(*keys.presses.lock().unwrap(), 1);
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn idle_waits_for_queue() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[None], &[None], &[None]);
        let mut poller = Poller::new(source, &chat, &keys, &config());

        assert_eq!(poller.start().await.unwrap(), PlaybackState::Idle);
        assert_eq!(poller.step().await.unwrap(), None);
        assert_eq!(poller.state(), Some(PlaybackState::Idle));
        assert_eq!(*keys.presses.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn idle_to_playing_skips_once() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[None], &[None], &[None, song()]);
        let mut poller = Poller::new(source, &chat, &keys, &config());

        assert_eq!(poller.start().await.unwrap(), PlaybackState::Idle);
        assert_eq!(poller.step().await.unwrap(), None);
        assert_eq!(poller.step().await.unwrap(), Some(Transition::Started));

        assert_eq!(poller.state(), Some(PlaybackState::Playing));
        assert_eq!(*chat.sent.lock().unwrap(), vec!["!skip".to_string()]);
        assert_eq!(*keys.presses.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn configured_skip_command_is_sent() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[None], &[None], &[song()]);
        let config = Config {
            skip_command: "!sr skip".into(),
            ..config()
        };
        let mut poller = Poller::new(source, &chat, &keys, &config);

        poller.step().await.unwrap();
        assert_eq!(*chat.sent.lock().unwrap(), vec!["!sr skip".to_string()]);
    }

    #[tokio::test]
    async fn failed_query_keeps_state() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[Some("A")], &[Some("B")], &[None]);
        let mut poller = Poller::new(source, &chat, &keys, &config());

        poller.start().await.unwrap();
        *poller.source.fail_queries.lock().unwrap() = true;

        assert!(poller.step().await.is_err());
        assert_eq!(poller.state(), Some(PlaybackState::Playing));
        assert_eq!(*keys.presses.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn key_press_waits_for_toggle_delay() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[Some("A"), Some("A")], &[Some("B"), Some("A")], &[None]);
        let config = Config::default();
        let mut poller = Poller::new(source, &chat, &keys, &config);

        poller.start().await.unwrap();
        let stopped_at = Instant::now();
        assert_eq!(poller.step().await.unwrap(), Some(Transition::Stopped));

        let pressed_at = keys.pressed_at.lock().unwrap().clone();
        assert_eq!(pressed_at.len(), 1);
        assert!(pressed_at[0] - stopped_at >= config.toggle_delay());
    }

    #[tokio::test(start_paused = true)]
    async fn run_queries_once_per_interval() {
        let (chat, keys) = (FakeChat::default(), FakeKeys::default());
        let source = FakeSource::new(&[None], &[None], &[None]);
        let config = Config::default();
        let mut poller = Poller::new(source, &chat, &keys, &config);

        let interval = config.poll_interval();
        let ran = tokio::time::timeout(interval * 3 + interval / 2, poller.run()).await;
        assert!(ran.is_err());

        let queried_at = poller.source.next_queried_at.lock().unwrap().clone();
        assert_eq!(queried_at.len(), 4);
        assert!(queried_at.windows(2).all(|pair| pair[1] - pair[0] == interval));
        assert_eq!(*keys.presses.lock().unwrap(), 0);
    }
}

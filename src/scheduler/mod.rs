//! Publishing run loop
//!
//! One run picks a random category, generates a fact, checks it against the
//! ledger, optionally illustrates it and publishes it, repeating until
//! `posts_per_run` facts went out or the attempt budget is spent. Runs are
//! separated by a fixed sleep.
//!
//! ```text
//! Idle ─► Selecting ─► Generating ─► Checking ─► Publishing ─┐
//!            ▲                          │ duplicate          │
//!            └──────────────────────────┴────────────────────┘
//!                                       │ done / aborted
//!                                       ▼
//!                                   Sleeping ─► Idle
//! ```

use crate::channels::TelegramAdapter;
use crate::config::BotConfig;
use crate::content::{FactGenerator, Illustrator};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::models::OpenAiClient;
use crate::publisher::Publisher;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Where the run loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Selecting,
    Generating,
    Checking,
    Publishing,
    Sleeping,
}

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Facts delivered
    pub published: u32,
    /// Attempts rejected by the ledger
    pub duplicates: u32,
    /// Generation attempts made
    pub attempts: u32,
    /// Why the run stopped early, if it did
    pub aborted: Option<String>,
}

/// Drives publishing runs
pub struct Runner {
    categories: Vec<String>,
    posts_per_run: u32,
    max_attempts: u32,
    interval: Duration,
    generator: FactGenerator,
    illustrator: Illustrator,
    publisher: Publisher,
    /// `None` while the ledger file could not be opened
    ledger: Option<Ledger>,
    ledger_path: Option<PathBuf>,
    rng: StdRng,
    state: RunState,
}

impl Runner {
    pub fn new(
        config: &BotConfig,
        generator: FactGenerator,
        illustrator: Illustrator,
        publisher: Publisher,
        ledger: Ledger,
    ) -> Self {
        Self::assemble(config, generator, illustrator, publisher, Some(ledger), None)
    }

    /// Like [`Runner::new`], but opens the ledger at `path`. An open failure
    /// is logged and retried at the start of every run.
    pub fn with_ledger_path(
        config: &BotConfig,
        generator: FactGenerator,
        illustrator: Illustrator,
        publisher: Publisher,
        path: PathBuf,
    ) -> Self {
        let ledger = match Ledger::open(&path) {
            Ok(ledger) => Some(ledger),
            Err(e) => {
                tracing::error!(error = %e, "Ledger unavailable, will retry on next run");
                None
            }
        };
        Self::assemble(config, generator, illustrator, publisher, ledger, Some(path))
    }

    fn assemble(
        config: &BotConfig,
        generator: FactGenerator,
        illustrator: Illustrator,
        publisher: Publisher,
        ledger: Option<Ledger>,
        ledger_path: Option<PathBuf>,
    ) -> Self {
        Self {
            categories: config.content.categories.clone(),
            posts_per_run: config.schedule.posts_per_run,
            max_attempts: config.schedule.max_attempts,
            interval: config.interval(),
            generator,
            illustrator,
            publisher,
            ledger,
            ledger_path,
            rng: StdRng::from_entropy(),
            state: RunState::Idle,
        }
    }

    /// Wire up the OpenAI client, the Telegram adapter and the ledger file.
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let openai = Arc::new(OpenAiClient::new(config.openai.clone())?);
        let generator = FactGenerator::new(openai.clone(), &config.openai, &config.content);
        let illustrator = Illustrator::new(openai, &config.content);
        let publisher = Publisher::new(Arc::new(TelegramAdapter::new(config.telegram.clone())));

        tracing::info!(
            ledger = %config.storage.ledger_path.display(),
            categories = config.content.categories.len(),
            images = illustrator.is_enabled(),
            "Runner initialized"
        );

        Ok(Self::with_ledger_path(
            config,
            generator,
            illustrator,
            publisher,
            config.storage.ledger_path.clone(),
        ))
    }

    /// Use a deterministic category sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Override the sleep between runs
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The open ledger, if any
    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    fn ensure_ledger(&mut self) -> Result<()> {
        if self.ledger.is_some() {
            return Ok(());
        }
        match &self.ledger_path {
            Some(path) => {
                self.ledger = Some(Ledger::open(path)?);
                tracing::info!(ledger = %path.display(), "Ledger reopened");
                Ok(())
            }
            None => Err(Error::Storage("Ledger is not open".to_string())),
        }
    }

    fn transition(&mut self, next: RunState) {
        tracing::trace!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }

    /// Execute one run.
    pub async fn run_once(&mut self) -> RunReport {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> RunReport {
        let mut report = RunReport::default();
        let mut left = self.posts_per_run;
        let mut guard = self.max_attempts;

        if let Err(e) = self.ensure_ledger() {
            tracing::error!(error = %e, "Ledger unavailable, skipping run");
            report.aborted = Some(e.to_string());
            self.transition(RunState::Idle);
            return report;
        }

        while left > 0 && guard > 0 {
            guard -= 1;
            report.attempts += 1;

            self.transition(RunState::Selecting);
            let Some(category) = self.categories.choose(&mut self.rng).cloned() else {
                report.aborted = Some("no categories configured".to_string());
                break;
            };

            self.transition(RunState::Generating);
            let fact = self.generator.generate(&category).await;

            self.transition(RunState::Checking);
            let seen = match &self.ledger {
                Some(ledger) => ledger.seen_or_record(&fact.fingerprint()),
                None => Err(Error::Storage("Ledger is not open".to_string())),
            };
            match seen {
                Ok(false) => {}
                Ok(true) => {
                    report.duplicates += 1;
                    tracing::info!(category = %category, title = %fact.title, "Duplicate fact, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Ledger unavailable, skipping rest of run");
                    report.aborted = Some(e.to_string());
                    break;
                }
            }

            let image_url = self.illustrator.generate_image(&fact.title, &category).await;

            self.transition(RunState::Publishing);
            match self.publisher.publish(&fact, &image_url).await {
                Ok(()) => {
                    left -= 1;
                    report.published += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Publishing failed, skipping rest of run");
                    report.aborted = Some(e.to_string());
                    break;
                }
            }
        }

        if left > 0 && report.aborted.is_none() {
            tracing::warn!(
                missing = left,
                attempts = report.attempts,
                "Attempt budget exhausted before reaching posts_per_run"
            );
        }

        self.transition(RunState::Idle);
        tracing::info!(
            published = report.published,
            duplicates = report.duplicates,
            attempts = report.attempts,
            "Run finished"
        );
        report
    }

    /// Run, sleep, repeat until `shutdown` resolves. Returns the number of
    /// runs that completed.
    pub async fn run_forever<F>(&mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut runs = 0u64;

        loop {
            tokio::select! {
                _ = self.run_once() => runs += 1,
                _ = &mut shutdown => break,
            }

            self.transition(RunState::Sleeping);
            tracing::debug!(seconds = self.interval.as_secs(), "Sleeping until next run");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => break,
            }
            self.transition(RunState::Idle);
        }

        self.transition(RunState::Idle);
        tracing::info!(runs, "Run loop stopped");
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelAdapter;
    use crate::models::{CompletionRequest, ImageModel, ImageRequest, TextModel};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const SKY: &str = r#"{"title":"Why the sky is blue","body":"Rayleigh scattering ...","tags":["physics","light"]}"#;
    const OCTOPUS: &str = r#"{"title":"Octopus hearts","body":"Octopuses have three hearts.","tags":["animals"]}"#;

    /// Replays scripted responses; the last one repeats forever.
    struct ScriptedModel {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.pop_front().unwrap())
            } else {
                Ok(responses.front().cloned().unwrap_or_default())
            }
        }
    }

    struct FixedImage;

    #[async_trait]
    impl ImageModel for FixedImage {
        async fn generate_image(&self, _request: &ImageRequest) -> Result<Option<String>> {
            Ok(Some("https://img.example/fact.png".to_string()))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        Photo(String, String),
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
    }

    #[async_trait]
    impl ChannelAdapter for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_text(&self, text: &str) -> Result<String> {
            if self.fail {
                return Err(Error::Delivery("Telegram sendMessage timed out".to_string()));
            }
            self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
            Ok("1".to_string())
        }

        async fn send_photo(&self, caption: &str, photo_url: &str) -> Result<String> {
            if self.fail {
                return Err(Error::Delivery("Telegram sendPhoto timed out".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Photo(caption.to_string(), photo_url.to_string()));
            Ok("2".to_string())
        }
    }

    fn test_config(categories: &[&str], posts_per_run: u32, max_attempts: u32) -> BotConfig {
        let mut config = BotConfig::default();
        config.content.categories = categories.iter().map(|c| c.to_string()).collect();
        config.content.images_enabled = false;
        config.schedule.posts_per_run = posts_per_run;
        config.schedule.max_attempts = max_attempts;
        config
    }

    fn build_runner(
        config: &BotConfig,
        model: Arc<ScriptedModel>,
        channel: Arc<RecordingChannel>,
    ) -> Runner {
        let generator = FactGenerator::new(model, &config.openai, &config.content);
        let illustrator = Illustrator::new(Arc::new(FixedImage), &config.content);
        let publisher = Publisher::new(channel);
        let ledger = Ledger::open_in_memory().unwrap();
        Runner::new(config, generator, illustrator, publisher, ledger).with_seed(7)
    }

    #[tokio::test]
    async fn test_space_scenario_publishes_once_and_skips_duplicate() {
        let config = test_config(&["Space"], 2, 3);
        let model = ScriptedModel::new(&[SKY]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model.clone(), channel.clone());

        let report = runner.run_once().await;

        assert_eq!(report.published, 1);
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.attempts, 3);
        assert!(report.aborted.is_none());
        assert_eq!(runner.ledger().unwrap().len().unwrap(), 1);
        assert_eq!(runner.state(), RunState::Idle);

        let sent = channel.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![Sent::Text(
                "<b>Why the sky is blue</b>\nRayleigh scattering ...\n\n#physics #light".to_string()
            )]
        );

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p.contains("Category: Space.")));
    }

    #[tokio::test]
    async fn test_duplicate_then_new_fact() {
        let config = test_config(&["Animals"], 2, 10);
        let model = ScriptedModel::new(&[SKY, SKY, OCTOPUS]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model, channel.clone());

        let report = runner.run_once().await;

        assert_eq!(report.published, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.attempts, 3);
        assert_eq!(channel.sent.lock().unwrap().len(), 2);
        assert_eq!(runner.ledger().unwrap().len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_second_run_skips_already_posted() {
        let config = test_config(&["Space"], 1, 2);
        let model = ScriptedModel::new(&[SKY]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model, channel.clone());

        assert_eq!(runner.run_once().await.published, 1);
        let second = runner.run_once().await;
        assert_eq!(second.published, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_aborts_run() {
        let config = test_config(&["Space"], 3, 10);
        let model = ScriptedModel::new(&[SKY, OCTOPUS]);
        let channel = Arc::new(RecordingChannel {
            fail: true,
            ..Default::default()
        });
        let mut runner = build_runner(&config, model, channel);

        let report = runner.run_once().await;

        assert_eq!(report.published, 0);
        assert_eq!(report.attempts, 1);
        assert!(report.aborted.unwrap().contains("timed out"));
        // Recorded at check time, before delivery was attempted.
        assert_eq!(runner.ledger().unwrap().len().unwrap(), 1);
        assert_eq!(runner.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_run() {
        let config = test_config(&["Space"], 1, 10);
        let model = ScriptedModel::new(&[SKY]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model, channel.clone());
        runner.ledger().unwrap().execute_raw("DROP TABLE posts");

        let report = runner.run_once().await;

        assert_eq!(report.published, 0);
        assert_eq!(report.attempts, 1);
        assert!(report.aborted.unwrap().starts_with("Storage error"));
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unopenable_ledger_aborts_run_and_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.sqlite3");
        std::fs::create_dir(&path).unwrap();

        let config = test_config(&["Space"], 1, 3);
        let model = ScriptedModel::new(&[SKY]);
        let channel = Arc::new(RecordingChannel::default());
        let generator = FactGenerator::new(model.clone(), &config.openai, &config.content);
        let illustrator = Illustrator::disabled();
        let publisher = Publisher::new(channel.clone());
        let mut runner =
            Runner::with_ledger_path(&config, generator, illustrator, publisher, path.clone());
        assert!(runner.ledger().is_none());

        let first = runner.run_once().await;
        assert_eq!(first.published, 0);
        assert_eq!(first.attempts, 0);
        assert!(first.aborted.unwrap().starts_with("Storage error"));
        assert!(model.prompts.lock().unwrap().is_empty());
        assert!(channel.sent.lock().unwrap().is_empty());
        assert_eq!(runner.state(), RunState::Idle);

        std::fs::remove_dir(&path).unwrap();

        let second = runner.run_once().await;
        assert_eq!(second.published, 1);
        assert!(second.aborted.is_none());
        assert_eq!(runner.ledger().unwrap().len().unwrap(), 1);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_survives_unopenable_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&["Space"], 1, 1);
        config.storage.ledger_path = dir.path().to_path_buf();

        let mut runner = Runner::from_config(&config).unwrap();
        assert!(runner.ledger().is_none());

        let report = runner.run_once().await;
        assert_eq!(report.attempts, 0);
        assert!(report.aborted.is_some());
    }

    #[tokio::test]
    async fn test_fallback_fact_is_published_once() {
        let config = test_config(&["History"], 2, 4);
        let model = ScriptedModel::new(&["I'd rather not."]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model, channel.clone());

        let report = runner.run_once().await;

        assert_eq!(report.published, 1);
        assert_eq!(report.duplicates, 3);
        let sent = channel.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![Sent::Text(
                "<b>Fact: History</b>\nGeneration failed.\n\n#History".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_images_enabled_sends_photo() {
        let mut config = test_config(&["Space"], 1, 1);
        config.content.images_enabled = true;
        let model = ScriptedModel::new(&[SKY]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model, channel.clone());

        assert_eq!(runner.run_once().await.published, 1);

        let sent = channel.sent.lock().unwrap();
        match &sent[0] {
            Sent::Photo(caption, url) => {
                assert!(caption.ends_with("#physics #light"));
                assert_eq!(url, "https://img.example/fact.png");
            }
            other => panic!("expected photo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_categories_are_drawn_from_config() {
        let config = test_config(&["Space", "History", "Animals"], 5, 5);
        let model = ScriptedModel::new(&[SKY, OCTOPUS, "a", "b", "c"]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner = build_runner(&config, model.clone(), channel);

        runner.run_once().await;

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 5);
        for prompt in prompts.iter() {
            assert!(
                ["Space", "History", "Animals"]
                    .iter()
                    .any(|c| prompt.contains(&format!("Category: {}.", c)))
            );
        }
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_shutdown() {
        let config = test_config(&["Space"], 1, 1);
        let model = ScriptedModel::new(&[SKY]);
        let channel = Arc::new(RecordingChannel::default());
        let mut runner =
            build_runner(&config, model, channel.clone()).with_interval(Duration::from_millis(10));

        let runs = runner
            .run_forever(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        assert!(runs >= 2);
        assert_eq!(runner.state(), RunState::Idle);
        // Only the first run had novel content.
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_end_to_end() {
        use crate::test_support::spawn_server;
        use axum::{routing::post, Json, Router};

        let sent: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = sent.clone();
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(|| async {
                    Json(serde_json::json!({
                        "choices": [{"message": {"content": format!("Here it is: {}", SKY)}}]
                    }))
                }),
            )
            .route(
                "/botTOKEN/sendMessage",
                post(move |Json(body): Json<serde_json::Value>| {
                    let captured = captured.clone();
                    async move {
                        captured.lock().unwrap().push(body);
                        Json(serde_json::json!({"ok": true, "result": {"message_id": 1}}))
                    }
                }),
            );
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();

        let mut config = test_config(&["Space"], 1, 3);
        config.openai.api_key = "sk-test".to_string();
        config.openai.base_url = format!("{}/v1", base);
        config.telegram.bot_token = "TOKEN".to_string();
        config.telegram.chat_id = "@facts".to_string();
        config.telegram.api_base = base;
        config.storage.ledger_path = dir.path().join("facts.sqlite3");

        let mut runner = Runner::from_config(&config).unwrap();
        let report = runner.run_once().await;
        assert_eq!(report.published, 1);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], "@facts");
        assert_eq!(
            sent[0]["text"],
            "<b>Why the sky is blue</b>\nRayleigh scattering ...\n\n#physics #light"
        );
        drop(runner);

        let ledger = Ledger::open(dir.path().join("facts.sqlite3")).unwrap();
        assert!(ledger
            .contains(&crate::ledger::Fingerprint::of(
                "Why the sky is blue",
                "Rayleigh scattering ..."
            ))
            .unwrap());
    }
}

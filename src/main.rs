use anyhow::{bail, Context};
use camnotify::config::{Config, ConfigStore, HttpConfig};
use camnotify::error::TransportError;
use camnotify::events::Event;
use camnotify::filters::{FilterDecision, FilterPipeline};
use camnotify::notifier::{DeliveryStatusStore, Dispatcher, NotificationManager, ReqwestTransport};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Notify};

/// Lines of input, read off the async runtime
type LineReceiver = mpsc::Receiver<std::io::Result<String>>;

const DEFAULT_CONFIG: &str = "camnotify.toml";

/// Command-line arguments for the camera event notifier
#[derive(Parser)]
#[command(
    name = "camnotify",
    about = "Camera event notifier - filters detections and pushes alerts",
    long_about = "Reads camera detection events as JSON lines, applies the configured quiet hours, \
                  zone, label, score and sublabel filters, and delivers a notification for every \
                  admitted event to each configured provider."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format, default: camnotify.toml)"
    )]
    config: Option<PathBuf>,

    /// Read events from a file instead of stdin
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "JSON-lines file of events to process (default: stdin)"
    )]
    events: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        let config_path = self.config_path();
        if !config_path.is_file() {
            return Err(format!(
                "Configuration file not found: {}",
                config_path.display()
            ));
        }
        if let Some(extension) = config_path.extension() {
            if extension != "toml" {
                warn!(
                    "Configuration file does not have .toml extension: {}",
                    config_path.display()
                );
            }
        }

        if let Some(ref events) = self.events {
            if !events.is_file() {
                return Err(format!("Events path is not a file: {}", events.display()));
            }
        }

        Ok(())
    }

    fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG))
    }
}

/// Counters reported at shutdown
#[derive(Debug, Default, PartialEq, Eq)]
struct RunSummary {
    received: usize,
    dropped: usize,
    notified: usize,
    invalid: usize,
}

/// Ties the configuration, filter pipeline and notifier together
struct EventProcessor {
    store: ConfigStore,
    pipeline: FilterPipeline,
    status: Arc<DeliveryStatusStore>,
    /// Settings the current transport was built with
    http: HttpConfig,
    dispatcher: Dispatcher,
    manager: NotificationManager,
    summary: RunSummary,
}

fn build_dispatcher(
    http: &HttpConfig,
    status: &Arc<DeliveryStatusStore>,
) -> Result<Dispatcher, TransportError> {
    let transport = ReqwestTransport::from_config(http)?;
    Ok(Dispatcher::new(Arc::new(transport), Arc::clone(status)))
}

impl EventProcessor {
    fn new(store: ConfigStore, status: Arc<DeliveryStatusStore>) -> anyhow::Result<Self> {
        let config = store.snapshot();
        let dispatcher =
            build_dispatcher(&config.http, &status).context("Failed to initialise HTTP transport")?;
        let manager = NotificationManager::from_config(&config, dispatcher.clone())
            .context("Failed to set up notification providers")?;

        Ok(Self {
            store,
            pipeline: FilterPipeline::new(),
            status,
            http: config.http.clone(),
            dispatcher,
            manager,
            summary: RunSummary::default(),
        })
    }

    /// Pick up configuration changes made since the last event
    fn refresh_config(&mut self) {
        if self.store.reload_if_modified() {
            let config = self.store.snapshot();
            self.apply_config(&config);
        }
    }

    /// Rebuild the transport and providers for a reloaded configuration
    fn apply_config(&mut self, config: &Config) {
        if config.http != self.http {
            match build_dispatcher(&config.http, &self.status) {
                Ok(dispatcher) => {
                    info!(
                        "HTTP timeout is now {}s",
                        config.http.timeout_seconds
                    );
                    self.dispatcher = dispatcher;
                    self.http = config.http.clone();
                }
                Err(e) => error!("Keeping previous HTTP transport after reload: {}", e),
            }
        }

        match NotificationManager::from_config(config, self.dispatcher.clone()) {
            Ok(manager) => self.manager = manager,
            Err(e) => error!("Keeping previous providers after reload: {}", e),
        }
    }

    async fn process_line(&mut self, line: &str) {
        let event = match parse_event(line) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                warn!("Skipping malformed event: {}", e);
                self.summary.invalid += 1;
                return;
            }
        };

        self.summary.received += 1;
        self.refresh_config();
        let config = self.store.snapshot();

        match self.pipeline.evaluate(&event, &config.filters) {
            FilterDecision::Notify => {
                debug!("Event admitted: event_id={}", event.id);
                self.summary.notified += 1;
                self.manager.notify(&event).await;
            }
            FilterDecision::Drop(_) => {
                self.summary.dropped += 1;
            }
        }
    }

    async fn run(&mut self, mut lines: LineReceiver, shutdown: Arc<Notify>) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("Shutdown requested, stopping event processing");
                    break;
                }
                line = lines.recv() => {
                    match line {
                        Some(line) => {
                            let line = line.context("Failed to read events")?;
                            self.process_line(&line).await;
                        }
                        None => {
                            info!("End of event stream");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Read stdin on a dedicated thread
///
/// A blocked stdin read cannot be cancelled, so it must not live on the
/// runtime's blocking pool or shutdown would wait for the next line.
fn read_stdin_lines() -> LineReceiver {
    use std::io::BufRead;

    let (sender, receiver) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if sender.blocking_send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

/// Read lines from an async reader on a background task
fn read_lines<R>(reader: R) -> LineReceiver
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.transpose() {
            let failed = line.is_err();
            if sender.send(line).await.is_err() || failed {
                break;
            }
        }
    });
    receiver
}

/// Parse one JSON line into an event; blank lines yield `None`
fn parse_event(line: &str) -> Result<Option<Event>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting camera event notifier");

    if let Err(e) = cli.validate() {
        bail!("Invalid arguments: {}", e);
    }

    let config_path = cli.config_path();
    info!("Loading configuration from: {}", config_path.display());
    let store = ConfigStore::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let status = Arc::new(DeliveryStatusStore::new());
    let mut processor = EventProcessor::new(store, Arc::clone(&status))?;

    // Ctrl+C stops reading new events; in-flight dispatches finish first
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        signal.notify_one();
    })
    .context("Error setting SIGINT handler for graceful shutdown")?;

    let lines = match cli.events {
        Some(ref path) => {
            info!("Reading events from {}", path.display());
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open events file {}", path.display()))?;
            read_lines(BufReader::new(file))
        }
        None => {
            info!("Reading events from stdin. Press Ctrl+C to stop.");
            read_stdin_lines()
        }
    };
    processor.run(lines, shutdown).await?;

    let summary = &processor.summary;
    info!(
        "Processed {} events: {} notified, {} dropped, {} malformed",
        summary.received, summary.notified, summary.dropped, summary.invalid
    );
    match serde_json::to_string_pretty(&status.snapshot()) {
        Ok(json) => info!("Delivery status:\n{}", json),
        Err(e) => error!("Failed to serialize delivery status: {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let file = config_file("[source]\nserver = \"http://nvr:5000\"");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            events: None,
            verbose: false,
        };

        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/config.toml")),
            events: None,
            verbose: false,
        };

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let cli = Cli {
            config: Some(std::env::temp_dir()),
            events: None,
            verbose: false,
        };

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_with_missing_events_file() {
        let file = config_file("");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            events: Some(PathBuf::from("/nonexistent/events.jsonl")),
            verbose: false,
        };

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli {
            config: None,
            events: None,
            verbose: false,
        };

        assert_eq!(cli.config_path(), Path::new("camnotify.toml"));
    }

    #[test]
    fn test_parse_event_lines() {
        assert!(parse_event("   ").unwrap().is_none());
        assert!(parse_event("{not json").is_err());

        let event = parse_event(
            r#"{"id":"123","label":"person","sub_label":["bob"],"top_score":0.92,"zones":["driveway"],"has_snapshot":true}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.id, "123");
        assert_eq!(event.sub_labels, vec!["bob"]);
        assert_eq!(event.current_zones, vec!["driveway"]);
    }

    #[tokio::test]
    async fn test_processor_filters_and_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let file = config_file(&format!(
            r#"
[source]
server = "http://nvr.local:5000"

[filters.zones]
unzoned = "drop"

[filters.labels]
min_score = 80

[[gotify]]
server = "{}"
token = "token"
"#,
            server.uri()
        ));
        let store = ConfigStore::from_file(file.path()).unwrap();
        let status = Arc::new(DeliveryStatusStore::new());
        let mut processor = EventProcessor::new(store, Arc::clone(&status)).unwrap();

        let input = concat!(
            r#"{"id":"1","label":"person","top_score":0.92,"zones":["driveway"]}"#,
            "\n",
            r#"{"id":"2","label":"person","top_score":0.92,"zones":[]}"#,
            "\n",
            r#"{"id":"3","label":"person","top_score":0.5,"zones":["driveway"]}"#,
            "\n\n",
            "garbage\n",
        );
        processor
            .run(read_lines(BufReader::new(input.as_bytes())), Arc::new(Notify::new()))
            .await
            .unwrap();

        assert_eq!(
            processor.summary,
            RunSummary {
                received: 3,
                dropped: 2,
                notified: 1,
                invalid: 1,
            }
        );
        assert!(status.all_healthy());
    }

    const MINIMAL_CONFIG: &str = r#"
[source]
server = "http://nvr.local:5000"

[[gotify]]
server = "https://push.example.com"
token = "token"
"#;

    #[tokio::test]
    async fn test_shutdown_stops_waiting_for_input() {
        let file = config_file(MINIMAL_CONFIG);
        let store = ConfigStore::from_file(file.path()).unwrap();
        let mut processor =
            EventProcessor::new(store, Arc::new(DeliveryStatusStore::new())).unwrap();

        // The sender stays alive, so input never arrives and never ends
        let (_sender, lines) = mpsc::channel(1);
        let shutdown = Arc::new(Notify::new());
        shutdown.notify_one();

        let finished = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            processor.run(lines, shutdown),
        )
        .await;

        assert!(finished.is_ok());
        assert_eq!(processor.summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_reloaded_http_settings_replace_transport() {
        let file = config_file(MINIMAL_CONFIG);
        let store = ConfigStore::from_file(file.path()).unwrap();
        let mut processor =
            EventProcessor::new(store, Arc::new(DeliveryStatusStore::new())).unwrap();
        assert_eq!(processor.http.timeout_seconds, 10);

        let mut reloaded = (*processor.store.snapshot()).clone();
        reloaded.http.timeout_seconds = 30;
        reloaded.gotify[0].name = Some("phone".to_string());
        processor.apply_config(&reloaded);

        assert_eq!(processor.http.timeout_seconds, 30);
        assert_eq!(processor.manager.provider_ids(), vec!["phone"]);
    }
}

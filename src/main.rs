use clap::Parser;
use record_publish::kafka::{KafkaPublisher, TopicManager};
use record_publish::{
    ArtifactSink, Config, CycleDriver, Error, InputUnit, RecordPublisher, Relationship, Result,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "record-publish")]
#[command(about = "Publish CSV records to Kafka, routing each file to success or failure", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "publish.toml")]
    config: PathBuf,

    #[arg(short, long, value_name = "DIR", default_value = "out")]
    output: PathBuf,

    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Loading configuration from {:?}", args.config);
    let config = match Config::from_file(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!(
        kafka_brokers = ?config.kafka.brokers,
        topic = %config.publish.topic,
        async_enabled = config.publish.async_enabled,
        max_async_requests = ?config.publish.max_async_requests,
        schema = ?config.record.schema,
        "Configuration summary"
    );

    if config.kafka.create_topic {
        TopicManager::new(&config.kafka)?
            .ensure_topic_exists(&config.publish.topic)
            .await?;
    }

    let kafka = Arc::new(KafkaPublisher::new(&config.kafka)?);
    let publisher = RecordPublisher::new(kafka.clone(), config.publish.clone(), &config.record)?;
    let driver = CycleDriver::new(&config.driver);
    let sink = ArtifactSink::new(&args.output);

    let names = artifact_names(&args.inputs)?;
    let mut failed_inputs = 0;
    for (path, name) in args.inputs.iter().zip(&names) {
        let input = read_input(path).await?;

        let mut batch = publisher.open(input);
        let report = driver.drive(&publisher, &mut batch).await?;

        for artifact in report.artifacts() {
            let written = sink.write(name, artifact).await?;
            if artifact.relationship == Relationship::Failure {
                failed_inputs += 1;
                warn!("{:?}: failed records written to {:?}", path, written);
            } else {
                info!("{:?}: published records written to {:?}", path, written);
            }
        }
    }

    kafka.flush(Duration::from_millis(config.kafka.message_timeout_ms))?;

    info!(
        inputs = args.inputs.len(),
        inputs_with_failures = failed_inputs,
        "Publishing finished"
    );
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("input {:?} has no file name", path)))
}

/// One artifact name per input. Inputs sharing a file name get their position
/// prepended, so no input overwrites another's artifacts.
fn artifact_names(inputs: &[PathBuf]) -> Result<Vec<String>> {
    let mut taken = HashSet::new();
    let mut names = Vec::with_capacity(inputs.len());

    for (index, path) in inputs.iter().enumerate() {
        let filename = file_name(path)?;
        let mut name = filename.clone();
        let mut attempt = index;
        while !taken.insert(name.clone()) {
            name = format!("{}-{}", attempt, filename);
            attempt += inputs.len();
        }
        names.push(name);
    }

    Ok(names)
}

async fn read_input(path: &Path) -> Result<InputUnit> {
    let content = tokio::fs::read(path).await?;
    let filename = file_name(path)?;

    Ok(InputUnit::new(content)
        .with_attribute("filename", filename)
        .with_attribute("path", path.to_string_lossy()))
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("record_publish=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("record_publish=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

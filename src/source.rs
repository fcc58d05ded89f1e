//! Source orchestration.
//!
//! A run builds one stream per extraction target (the users list and every
//! configured database). Each stream runs as its own tokio task and hands
//! batches of routed records to the loader through a bounded channel, so
//! batches of one stream arrive in cursor order while streams interleave
//! freely.

use std::sync::Arc;

use futures::{pin_mut, StreamExt};
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

use crate::client::NotionApi;
use crate::config::{DatabaseResource, Limit, SourceConfig};
use crate::error::{Result, SourceError};
use crate::melt::Loader;
use crate::paginate::Paginator;
use crate::route::{database_route, route_user_value, RoutedRecord};
use crate::row::RowAssembler;

/// Name of the users stream in logs and in the [`RunSummary`].
pub const USERS_STREAM: &str = "users";

enum StreamMessage {
    Records {
        stream: String,
        records: Vec<RoutedRecord>,
    },
    Finished {
        stream: String,
    },
    Failed {
        stream: String,
        error: SourceError,
    },
}

/// Outcome of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub name: String,
    pub batches: usize,
    pub records: usize,
    /// Set when the stream failed and was skipped.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub streams: Vec<StreamReport>,
}

impl RunSummary {
    pub fn stream(&self, name: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|report| report.name == name)
    }

    pub fn total_records(&self) -> usize {
        self.streams.iter().map(|report| report.records).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &StreamReport> {
        self.streams.iter().filter(|report| report.error.is_some())
    }

    fn register(&mut self, name: &str) {
        self.streams.push(StreamReport {
            name: name.to_string(),
            ..StreamReport::default()
        });
    }

    fn report_mut(&mut self, name: &str) -> Option<&mut StreamReport> {
        self.streams.iter_mut().find(|report| report.name == name)
    }
}

/// The producing end of one stream.
struct StreamSink {
    stream: String,
    tx: mpsc::Sender<StreamMessage>,
}

impl StreamSink {
    async fn send(&self, records: Vec<RoutedRecord>) -> Result<()> {
        debug!(stream = %self.stream, records = records.len(), "batch ready");
        self.tx
            .send(StreamMessage::Records {
                stream: self.stream.clone(),
                records,
            })
            .await
            .map_err(|_| SourceError::Task(format!("loader channel closed for {}", self.stream)))
    }

    async fn close(self, outcome: Result<()>) {
        let message = match outcome {
            Ok(()) => StreamMessage::Finished {
                stream: self.stream,
            },
            Err(error) => StreamMessage::Failed {
                stream: self.stream,
                error,
            },
        };
        // The receiver is only gone once the run was aborted.
        let _ = self.tx.send(message).await;
    }
}

/// Extracts users and databases from a Notion workspace.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use notion_source::{DatabaseResource, NotionHttpClient, NotionSource, SourceConfig, TableWriter};
///
/// let config = SourceConfig::default().with_database(DatabaseResource::new(database_id));
/// let source = NotionSource::new(Arc::new(NotionHttpClient::new(token)), config);
/// let mut writer = TableWriter::new("out", Default::default())?;
/// let summary = source.run(&mut writer).await?;
/// ```
pub struct NotionSource {
    client: Arc<dyn NotionApi>,
    config: SourceConfig,
}

impl NotionSource {
    pub fn new(client: Arc<dyn NotionApi>, config: SourceConfig) -> Self {
        NotionSource { client, config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Run every stream to completion and hand all records to `loader`.
    ///
    /// A failing stream aborts the run unless `skip_failed_streams` is set,
    /// in which case the failure is recorded in the summary. An abort still
    /// calls `finish`, so batches loaded before it are committed.
    pub async fn run(self, loader: &mut dyn Loader) -> Result<RunSummary> {
        self.config.validate()?;

        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity);
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary::default();

        if self.config.include_users {
            summary.register(USERS_STREAM);
            let sink = StreamSink {
                stream: USERS_STREAM.to_string(),
                tx: tx.clone(),
            };
            let client = Arc::clone(&self.client);
            let limit = self.config.users_limit;
            tasks.spawn(async move {
                let outcome = extract_users(client, limit, &sink).await;
                sink.close(outcome).await;
            });
        }

        for resource in &self.config.databases {
            summary.register(&resource.database_id);
            let sink = StreamSink {
                stream: resource.database_id.clone(),
                tx: tx.clone(),
            };
            let client = Arc::clone(&self.client);
            let resource = resource.clone();
            tasks.spawn(async move {
                let outcome = extract_database(client, resource, &sink).await;
                sink.close(outcome).await;
            });
        }
        drop(tx);

        info!(streams = summary.streams.len(), "extraction started");

        while let Some(message) = rx.recv().await {
            match message {
                StreamMessage::Records { stream, records } => {
                    if let Some(report) = summary.report_mut(&stream) {
                        report.batches += 1;
                        report.records += records.len();
                    }
                    if let Err(e) = blocking(|| loader.load(records)) {
                        error!(stream = %stream, error = %e, "loader failed, aborting run");
                        return Err(abort(&mut tasks, loader, e.into()));
                    }
                }
                StreamMessage::Finished { stream } => {
                    let records = summary.report_mut(&stream).map_or(0, |report| report.records);
                    info!(stream = %stream, records, "stream finished");
                }
                StreamMessage::Failed { stream, error } => {
                    if !self.config.skip_failed_streams {
                        error!(stream = %stream, error = %error, "stream failed, aborting run");
                        return Err(abort(&mut tasks, loader, error));
                    }
                    warn!(stream = %stream, error = %error, "stream failed, skipping");
                    if let Some(report) = summary.report_mut(&stream) {
                        report.error = Some(error.to_string());
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                return Err(abort(&mut tasks, loader, SourceError::Task(e.to_string())));
            }
        }

        blocking(|| loader.finish())?;
        info!(records = summary.total_records(), "extraction finished");
        Ok(summary)
    }
}

/// Stop the remaining streams and commit what the loader already holds.
fn abort(tasks: &mut JoinSet<()>, loader: &mut dyn Loader, error: SourceError) -> SourceError {
    tasks.abort_all();
    if let Err(e) = blocking(|| loader.finish()) {
        warn!(error = %e, "failed to commit batches loaded before the abort");
    }
    error
}

/// Loaders do blocking file I/O. On a multi-threaded runtime it runs in place
/// so the worker's other tasks move elsewhere; a current-thread runtime has no
/// other worker to hand them to.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(f)
        }
        _ => f(),
    }
}

async fn extract_users(client: Arc<dyn NotionApi>, limit: Limit, sink: &StreamSink) -> Result<()> {
    if limit.remaining(0) == Some(0) {
        debug!("users limit is zero, skipping requests");
        return Ok(());
    }

    let client = client.as_ref();
    let paginator = Paginator::new(move |cursor| client.list_users(cursor));
    let batches = paginator.batches();
    pin_mut!(batches);

    let mut emitted = 0;
    while let Some(batch) = batches.next().await {
        let mut users = batch?;
        if let Some(remaining) = limit.remaining(emitted) {
            users.truncate(remaining);
        }

        let records = users
            .into_iter()
            .map(route_user_value)
            .collect::<Result<Vec<_>>>()?;
        emitted += records.len();
        sink.send(records).await?;

        if limit.remaining(emitted) == Some(0) {
            debug!(emitted, "users limit reached");
            break;
        }
    }

    Ok(())
}

async fn extract_database(
    client: Arc<dyn NotionApi>,
    resource: DatabaseResource,
    sink: &StreamSink,
) -> Result<()> {
    let database = client.retrieve_database(&resource.database_id).await?;
    let assembler = RowAssembler::new(&database, &resource)?;
    let route = database_route(&database, &resource);
    info!(
        database = %resource.database_id,
        table = %route.table,
        columns = assembler.selection().len(),
        "resolved database schema"
    );

    let client = client.as_ref();
    let database_id = resource.database_id.as_str();
    let paginator = Paginator::new(move |cursor| client.query_database(database_id, cursor));
    let batches = paginator.batches();
    pin_mut!(batches);

    while let Some(batch) = batches.next().await {
        let rows = assembler.assemble_batch(&batch?)?;
        let records = rows
            .into_iter()
            .map(|row| RoutedRecord {
                route: route.clone(),
                row,
            })
            .collect();
        sink.send(records).await?;
    }

    Ok(())
}

use crate::config::{Configuration, ErrorPolicy};
use crate::error::Error;
use crate::events::NewImages;
use crate::pipeline::ImagePipeline;
use crate::scan;
use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Directory subscribed to for create events.
    pub dir: PathBuf,
    pub policy: ErrorPolicy,
    /// Capacity of the ingestion -> worker queue.
    pub queue_depth: usize,
    /// Delay before each triggered batch is processed.
    pub settle: Duration,
}

impl WatchSettings {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            dir: scan::watch_dir(&cfg.input),
            policy: cfg.on_error,
            queue_depth: cfg.watch_queue_depth,
            settle: cfg.watch_settle,
        }
    }
}

/// Watches `settings.dir` and feeds every newly created file through `pipeline`.
///
/// Ingestion and processing are separate tasks joined by a bounded queue, so a
/// slow batch applies backpressure to the notify thread instead of buffering
/// without limit. A fatal batch error stops ingestion and is returned; watcher
/// errors are logged and the loop carries on.
#[instrument(skip(pipeline, settings, cancel), fields(dir = %settings.dir.display()))]
pub async fn run(
    pipeline: Arc<ImagePipeline>,
    settings: WatchSettings,
    cancel: CancellationToken,
) -> Result<()> {
    let stop = cancel.child_token();
    let (work_tx, work_rx) = mpsc::channel::<NewImages>(settings.queue_depth.max(1));

    let worker = tokio::spawn(process_queue(
        pipeline,
        work_rx,
        settings.policy,
        settings.settle,
        stop.clone(),
    ));

    let ingested = ingest(&settings.dir, work_tx, stop.clone()).await;
    if ingested.is_err() {
        stop.cancel();
    }
    let processed = worker.await.context("watch worker panicked")?;
    ingested?;
    processed
}

async fn ingest(dir: &Path, work_tx: Sender<NewImages>, stop: CancellationToken) -> Result<()> {
    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })
    .map_err(|source| Error::Watch {
        path: dir.to_path_buf(),
        source,
    })?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|source| Error::Watch {
            path: dir.to_path_buf(),
            source,
        })?;
    info!(watching = %dir.display(), "Monitoring for new images");

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                info!("cancel received; stopping watch");
                break;
            }

            maybe_res = watch_rx.recv() => {
                let Some(res) = maybe_res else {
                    info!("watch channel closed");
                    break;
                };
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        error!("watch error: {err}");
                        continue;
                    }
                };
                debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
                for trigger in arrivals(event) {
                    info!(path = %trigger.display(), "New image");
                    let matches = scan::resolve_event_path(&trigger)?;
                    if matches.is_empty() {
                        debug!(path = %trigger.display(), "vanished before processing");
                        continue;
                    }
                    let item = NewImages { trigger, matches };
                    tokio::select! {
                        _ = stop.cancelled() => return Ok(()),
                        sent = work_tx.send(item) => {
                            if sent.is_err() {
                                warn!("watch worker gone; stopping ingestion");
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Paths that newly appeared in the directory: creations, and renames whose
/// destination is inside it.
fn arrivals(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths,
        // paths = [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.into_iter().skip(1).collect()
        }
        // macOS often reports moves as Name(Any). Decide per-path by existence.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.into_iter().filter(|p| p.exists()).collect()
        }
        _ => Vec::new(),
    }
}

async fn process_queue(
    pipeline: Arc<ImagePipeline>,
    work_rx: Receiver<NewImages>,
    policy: ErrorPolicy,
    settle: Duration,
    stop: CancellationToken,
) -> Result<()> {
    let outcome = drain_queue(pipeline, work_rx, policy, settle, &stop).await;
    if outcome.is_err() {
        stop.cancel();
    }
    outcome
}

async fn drain_queue(
    pipeline: Arc<ImagePipeline>,
    mut work_rx: Receiver<NewImages>,
    policy: ErrorPolicy,
    settle: Duration,
    stop: &CancellationToken,
) -> Result<()> {
    loop {
        let item = tokio::select! {
            _ = stop.cancelled() => break,
            maybe_item = work_rx.recv() => match maybe_item {
                Some(item) => item,
                None => break,
            },
        };

        if !settle.is_zero() {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(settle) => {}
            }
        }

        let NewImages { trigger, matches } = item;
        debug!(trigger = %trigger.display(), matches = matches.len(), "processing triggered batch");
        let pipeline = Arc::clone(&pipeline);
        tokio::task::spawn_blocking(move || pipeline.run_batch(&matches, policy))
            .await
            .context("pipeline task panicked")?
            .with_context(|| format!("processing batch triggered by {}", trigger.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut ev = Event::new(kind);
        for p in paths {
            ev = ev.add_path(PathBuf::from(p));
        }
        ev
    }

    #[test]
    fn creations_and_renames_into_dir_are_arrivals() {
        assert_eq!(
            arrivals(event(EventKind::Create(CreateKind::File), &["/w/a.jpg"])),
            vec![PathBuf::from("/w/a.jpg")]
        );
        assert_eq!(
            arrivals(event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                &["/w/b.jpg"]
            )),
            vec![PathBuf::from("/w/b.jpg")]
        );
        assert_eq!(
            arrivals(event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/w/c.tmp", "/w/c.jpg"]
            )),
            vec![PathBuf::from("/w/c.jpg")]
        );
    }

    #[test]
    fn other_events_are_ignored() {
        assert!(arrivals(event(EventKind::Remove(RemoveKind::File), &["/w/a.jpg"])).is_empty());
        assert!(
            arrivals(event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/w/a.jpg"]
            ))
            .is_empty()
        );
        assert!(
            arrivals(event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/w/a.jpg"]
            ))
            .is_empty()
        );
    }

    #[test]
    fn settings_derive_watch_dir_from_glob() {
        let cfg = Configuration {
            input: "/photos/in/*.jpg".to_string(),
            ..Configuration::default()
        };
        let settings = WatchSettings::from_config(&cfg);
        assert_eq!(settings.dir, PathBuf::from("/photos/in"));
        assert_eq!(settings.policy, ErrorPolicy::Abort);
    }
}

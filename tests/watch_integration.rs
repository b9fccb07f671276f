use image::{Rgb, RgbImage};
use inkcrop::config::{ErrorPolicy, ProcessingOptions};
use inkcrop::pipeline::ImagePipeline;
use inkcrop::tasks::watch::{self, WatchSettings};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
        .save(path)
        .unwrap();
}

async fn wait_for(path: &Path) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("timeout waiting for artifact");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_file_in_watched_dir_is_processed() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("in");
    let staging = tmp.path().join("staging");
    let out = tmp.path().join("out");
    for dir in [&watched, &staging, &out] {
        fs::create_dir_all(dir).unwrap();
    }

    // Present before the watch starts: must not be processed.
    write_png(&watched.join("old.png"), 64, 36);

    let pipeline = Arc::new(ImagePipeline::new(
        ProcessingOptions {
            disperser: None,
            ..ProcessingOptions::default()
        },
        &out,
    ));
    let settings = WatchSettings {
        dir: watched.clone(),
        policy: ErrorPolicy::Continue,
        queue_depth: 4,
        settle: Duration::from_millis(200),
    };
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(watch::run(pipeline, settings, cancel.clone()));

    // Let the watcher register before the file appears.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let staged = staging.join("fresh.png");
    write_png(&staged, 480, 240);
    fs::rename(&staged, watched.join("fresh.png")).unwrap();

    let expected = out.join("fresh_960x480_0x30_resized.jpg");
    wait_for(&expected).await;

    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(image::image_dimensions(&expected).unwrap(), (960, 480));
    assert!(!out.join("old_960x540_0x0_resized.jpg").exists());
}

#[tokio::test]
async fn missing_watch_dir_fails_fast() {
    let tmp = tempdir().unwrap();
    let pipeline = Arc::new(ImagePipeline::new(ProcessingOptions::default(), tmp.path()));
    let settings = WatchSettings {
        dir: tmp.path().join("does-not-exist"),
        policy: ErrorPolicy::Abort,
        queue_depth: 1,
        settle: Duration::ZERO,
    };
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        watch::run(pipeline, settings, CancellationToken::new()),
    )
    .await
    .expect("watch setup should not hang");
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abort_policy_ends_watch_on_undecodable_file() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("in");
    let out = tmp.path().join("out");
    fs::create_dir_all(&watched).unwrap();
    fs::create_dir_all(&out).unwrap();

    let pipeline = Arc::new(ImagePipeline::new(
        ProcessingOptions {
            disperser: None,
            ..ProcessingOptions::default()
        },
        &out,
    ));
    let settings = WatchSettings {
        dir: watched.clone(),
        policy: ErrorPolicy::Abort,
        queue_depth: 4,
        settle: Duration::from_millis(300),
    };
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(watch::run(pipeline, settings, cancel.clone()));
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Written in place, so the watcher sees a plain create event.
    write_png(&watched.join("direct.png"), 96, 54);
    wait_for(&out.join("direct_960x540_0x0_resized.jpg")).await;
    assert!(!handle.is_finished());

    fs::write(watched.join("broken.jpg"), b"garbage").unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("watch should stop on its own after a fatal batch")
        .unwrap();
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("broken.jpg"), "{err:#}");
    assert!(!cancel.is_cancelled());
}

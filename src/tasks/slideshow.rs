use crate::buffer::PhotoBuffer;
use crate::error::{Error, Result as LibResult};
use anyhow::Result;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Rotate a single pointer file through `playlist`, one entry per `dwell`.
///
/// Each step points `link_path` at the next entry, waits, then removes the
/// pointer again. Cancellation retracts the pointer before returning.
#[instrument(skip(playlist, cancel), fields(link = %link_path.display(), entries = playlist.len()))]
pub async fn run(
    mut playlist: PhotoBuffer,
    link_path: PathBuf,
    dwell: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    info!(
        dwell = %humantime::format_duration(dwell),
        "Starting slideshow"
    );
    loop {
        let target = playlist.advance().to_path_buf();
        publish(&target, &link_path)?;
        info!(target = %target.display(), "Linked image");

        tokio::select! {
            _ = cancel.cancelled() => {
                retract(&link_path)?;
                info!("cancel received; slideshow stopped");
                return Ok(());
            }
            () = tokio::time::sleep(dwell) => {}
        }

        retract(&link_path)?;
        debug!(target = %target.display(), "Removed link");
    }
}

/// Point `link_path` at `target`, replacing whatever pointer is already there.
pub fn publish(target: &Path, link_path: &Path) -> LibResult<()> {
    retract(link_path)?;
    let absolute = std::path::absolute(target).map_err(|source| Error::Link {
        path: target.to_path_buf(),
        source,
    })?;
    symlink(&absolute, link_path).map_err(|source| Error::Link {
        path: link_path.to_path_buf(),
        source,
    })
}

/// Remove the pointer if present. A dangling link counts as present.
pub fn retract(link_path: &Path) -> LibResult<()> {
    match std::fs::symlink_metadata(link_path) {
        Ok(_) => std::fs::remove_file(link_path).map_err(|source| Error::Link {
            path: link_path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Link {
            path: link_path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn publish_replaces_existing_pointer() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let link = tmp.path().join("linkedimage.jpg");

        publish(&a, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), a);
        publish(&b, &link).unwrap();
        assert_eq!(fs::read(&link).unwrap(), b"b");
    }

    #[test]
    fn replacement_leaves_a_gap_between_pointers() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let link = tmp.path().join("linkedimage.jpg");

        publish(&a, &link).unwrap();
        retract(&link).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
        publish(&b, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), b);
    }

    #[test]
    fn retract_removes_dangling_links_and_tolerates_absence() {
        let tmp = tempdir().unwrap();
        let link = tmp.path().join("linkedimage.jpg");
        retract(&link).unwrap();

        std::os::unix::fs::symlink(tmp.path().join("gone.jpg"), &link).unwrap();
        assert!(!link.exists());
        retract(&link).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
    }
}

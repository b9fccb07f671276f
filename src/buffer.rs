//! Cyclic cursor over already-processed files, driven by the slideshow timer.

use std::path::{Path, PathBuf};

use crate::error::Error;

/// A fixed, non-empty list of files visited in order, wrapping forever.
#[derive(Debug, Clone)]
pub struct PhotoBuffer {
    items: Vec<PathBuf>,
    idx: usize,
}

impl PhotoBuffer {
    /// Construct a buffer from a list of paths.
    ///
    /// # Errors
    /// Returns [`Error::EmptyScan`] if `items` is empty; `origin` names what was scanned.
    pub fn from_vec(items: Vec<PathBuf>, origin: &str) -> Result<Self, Error> {
        if items.is_empty() {
            return Err(Error::EmptyScan(origin.to_string()));
        }
        Ok(Self { items, idx: 0 })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Return the current entry and move the cursor, wrapping at the end.
    pub fn advance(&mut self) -> &Path {
        let out = &self.items[self.idx];
        self.idx = (self.idx + 1) % self.items.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_rejected() {
        let err = PhotoBuffer::from_vec(Vec::new(), "*.jpg").unwrap_err();
        assert!(matches!(err, Error::EmptyScan(ref p) if p == "*.jpg"));
    }

    #[test]
    fn advance_wraps_in_order() {
        let mut buf =
            PhotoBuffer::from_vec(vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")], "x")
                .unwrap();
        assert_eq!(buf.len(), 2);
        let seen: Vec<PathBuf> = (0..5).map(|_| buf.advance().to_path_buf()).collect();
        assert_eq!(
            seen,
            ["a.jpg", "b.jpg", "a.jpg", "b.jpg", "a.jpg"].map(PathBuf::from)
        );
        assert_eq!(buf.advance(), Path::new("b.jpg"));
    }
}

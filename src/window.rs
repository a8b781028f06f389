//! The bounded record window currently on display.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::models::SeismicRecord;

/// Page size requested by the reference dashboard.
pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(19) {
    Some(n) => n,
    None => unreachable!(),
};

/// Ordered, immutable sequence of records from one fetch.
///
/// Clones share the same allocation; a window is replaced wholesale,
/// never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordWindow {
    records: Arc<[SeismicRecord]>,
}

impl RecordWindow {
    /// Build a window from feed rows, keeping feed order and capping at `page_size`.
    #[must_use]
    pub fn from_feed(mut records: Vec<SeismicRecord>, page_size: NonZeroUsize) -> Self {
        records.truncate(page_size.get());
        Self {
            records: records.into(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SeismicRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeismicRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[SeismicRecord] {
        &self.records
    }
}

impl<'a> IntoIterator for &'a RecordWindow {
    type Item = &'a SeismicRecord;
    type IntoIter = std::slice::Iter<'a, SeismicRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

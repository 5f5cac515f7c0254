use crate::error::{OvbdError, Result};
use crate::lsmt::mapping::{Segment, SegmentMapping, MAPPING_SIZE};

/// Read-only segment index: live mappings sorted by `offset`, pairwise
/// disjoint. Unmapped ranges between entries are holes.
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    mappings: Vec<SegmentMapping>,
}

impl SegmentIndex {
    /// Decode a serialized index and drop its tombstones.
    ///
    /// `raw` holds whole 16-byte records. Surviving entries keep their order
    /// and have `tag` reset to 0. Entries out of order or overlapping their
    /// predecessor are rejected.
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        if raw.len() % MAPPING_SIZE != 0 {
            return Err(OvbdError::Format(format!(
                "segment index is {} bytes, not a multiple of {}",
                raw.len(),
                MAPPING_SIZE
            )));
        }

        let mut mappings = Vec::with_capacity(raw.len() / MAPPING_SIZE);
        for chunk in raw.chunks_exact(MAPPING_SIZE) {
            let mut record = [0u8; MAPPING_SIZE];
            record.copy_from_slice(chunk);
            mappings.push(SegmentMapping::decode(&record));
        }

        Self::from_mappings(mappings)
    }

    /// Build an index from decoded entries, compacting in place.
    pub fn from_mappings(mut mappings: Vec<SegmentMapping>) -> Result<Self> {
        let total = mappings.len();
        let mut live = 0;
        for i in 0..total {
            if mappings[i].is_tombstone() {
                continue;
            }
            let mut m = mappings[i];
            m.tag = 0;
            if live > 0 && mappings[live - 1].end() > m.offset {
                return Err(OvbdError::Format(format!(
                    "segment index entry {} (offset {}) overlaps or precedes its predecessor ending at {}",
                    i,
                    m.offset,
                    mappings[live - 1].end()
                )));
            }
            mappings[live] = m;
            live += 1;
        }
        mappings.truncate(live);

        tracing::debug!(
            total,
            live,
            tombstones = total - live,
            "loaded segment index"
        );
        Ok(SegmentIndex { mappings })
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&SegmentMapping> {
        self.mappings.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SegmentMapping> {
        self.mappings.iter()
    }

    pub fn as_slice(&self) -> &[SegmentMapping] {
        &self.mappings
    }

    /// Position of the first mapping whose end lies beyond `offset`, i.e. the
    /// first one that could contain it. Returns `len()` when there is none.
    pub fn lower_bound(&self, offset: u64) -> usize {
        self.mappings.partition_point(|m| m.end() <= offset)
    }

    /// Copy the mappings intersecting `query` into `out`, trimmed to the
    /// query bounds, and return how many were written.
    ///
    /// At most `out.len()` entries are produced. When the batch comes back
    /// full the caller continues from the end of the last entry. A result of
    /// 0 means the whole query is a hole.
    pub fn lookup(&self, query: &Segment, out: &mut [SegmentMapping]) -> usize {
        if query.length == 0 || out.is_empty() {
            return 0;
        }

        let query_end = query.end();
        let mut n = 0;
        for m in &self.mappings[self.lower_bound(query.offset)..] {
            if m.offset >= query_end {
                break;
            }
            out[n] = *m;
            n += 1;
            if n == out.len() {
                break;
            }
        }
        if n == 0 {
            return 0;
        }

        if out[0].offset < query.offset {
            out[0].forward_offset_to(query.offset);
        }
        // may be out[0] again when n == 1
        let last = &mut out[n - 1];
        if last.end() > query_end {
            last.backward_end_to(query_end);
        }
        n
    }
}

impl<'a> IntoIterator for &'a SegmentIndex {
    type Item = &'a SegmentMapping;
    type IntoIter = std::slice::Iter<'a, SegmentMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.mappings.iter()
    }
}

use crate::utils::bit_vector::BitVec;

/// Run of set bits `start .. start + len`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub start: u32,
    pub len: u32,
}

/// Run-length encoded bit vector.
/// * Runs are sorted, non-empty and never adjacent.
/// * Random access scans runs linearly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RleBitVec {
    len: u32,
    runs: Vec<Run>,
}

impl RleBitVec {
    /// From ascending ids, duplicates are ignored.
    pub fn from_sorted_ids<I: IntoIterator<Item = u32>>(len: u32, ids: I) -> Self {
        let mut runs: Vec<Run> = vec![];
        for id in ids {
            if id >= len {
                continue;
            }
            match runs.last_mut() {
                Some(run) if id < run.start + run.len => {}
                Some(run) if id == run.start + run.len => run.len += 1,
                _ => runs.push(Run { start: id, len: 1 }),
            }
        }
        Self { len, runs }
    }

    pub fn from_bit_vec(v: &BitVec) -> Self {
        Self::from_sorted_ids(v.len() as u32, v.iter_ones())
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn cardinality(&self) -> usize {
        self.runs.iter().map(|r| r.len as usize).sum()
    }

    pub fn contains(&self, id: u32) -> bool {
        for run in &self.runs {
            if id < run.start {
                return false;
            }
            if id < run.start + run.len {
                return true;
            }
        }
        false
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = u32> + '_ {
        self.runs.iter().flat_map(|r| r.start..r.start + r.len)
    }

    pub fn to_bit_vec(&self) -> BitVec {
        BitVec::from_ids(self.len as usize, self.iter_ones())
    }

    pub fn footprint_bytes(&self) -> usize {
        size_of::<Self>() + self.runs.capacity() * size_of::<Run>()
    }
}

use rayon::prelude::*;

use crate::{
    errors::TickError,
    kernel::AccessKernel,
    sparql::{sparql_core::SparqlCore, sparql_pattern::TriplePattern},
    store::triple_store::TripleStore,
    utils::prefetch::prefetch_read,
};

/// Patterns per parallel work item.
pub const PARALLEL_CHUNK: usize = 1024;

/// Fixed-width pattern evaluator over the store.
/// * Every lane of a group loads its predicate word before any lane branches.
/// * Answers equal `SparqlCore::ask_pattern` per element.
#[derive(Clone, Copy)]
pub struct BatchEvaluator<'a> {
    core: SparqlCore<'a>,
    vectorize: bool,
}

impl<'a> BatchEvaluator<'a> {
    pub fn new(store: &'a TripleStore) -> Self {
        Self {
            core: SparqlCore::new(store),
            vectorize: true,
        }
    }

    /// Eight lanes when set, four otherwise.
    pub fn with_vectorization(mut self, vectorize: bool) -> Self {
        self.vectorize = vectorize;
        self
    }

    pub fn lanes(&self) -> usize {
        if self.vectorize { 8 } else { 4 }
    }

    pub fn ask_batch(&self, patterns: &[TriplePattern], results: &mut [bool]) -> Result<(), TickError> {
        check_lengths(patterns, results)?;
        if self.vectorize {
            self.run_groups::<8>(patterns, results, false);
        } else {
            self.run_groups::<4>(patterns, results, false);
        }
        Ok(())
    }

    pub fn ask_batch4(&self, patterns: &[TriplePattern], results: &mut [bool]) -> Result<(), TickError> {
        check_lengths(patterns, results)?;
        self.run_groups::<4>(patterns, results, false);
        Ok(())
    }

    pub fn ask_batch8(&self, patterns: &[TriplePattern], results: &mut [bool]) -> Result<(), TickError> {
        check_lengths(patterns, results)?;
        self.run_groups::<8>(patterns, results, false);
        Ok(())
    }

    /// `ask_batch` that prefetches the next group's predicate rows.
    pub fn ask_batch_prefetch(
        &self,
        patterns: &[TriplePattern],
        results: &mut [bool],
    ) -> Result<(), TickError> {
        check_lengths(patterns, results)?;
        if self.vectorize {
            self.run_groups::<8>(patterns, results, true);
        } else {
            self.run_groups::<4>(patterns, results, true);
        }
        Ok(())
    }

    /// `ask_batch` over `PARALLEL_CHUNK` sized chunks on the rayon pool.
    pub fn ask_batch_parallel(
        &self,
        patterns: &[TriplePattern],
        results: &mut [bool],
    ) -> Result<(), TickError> {
        check_lengths(patterns, results)?;
        let vectorize = self.vectorize;
        results
            .par_chunks_mut(PARALLEL_CHUNK)
            .zip(patterns.par_chunks(PARALLEL_CHUNK))
            .for_each(|(out, chunk)| {
                if vectorize {
                    self.run_groups::<8>(chunk, out, true);
                } else {
                    self.run_groups::<4>(chunk, out, true);
                }
            });
        Ok(())
    }

    fn run_groups<const N: usize>(&self, patterns: &[TriplePattern], results: &mut [bool], prefetch: bool) {
        let mut groups = patterns.chunks_exact(N);
        let mut outs = results.chunks_exact_mut(N);
        let mut next = 0;
        for (group, out) in groups.by_ref().zip(outs.by_ref()) {
            next += N;
            if prefetch && let Some(ahead) = patterns.get(next..next + N) {
                self.prefetch_group(ahead);
            }
            self.eval_group::<N>(group, out);
        }
        for (pattern, out) in groups.remainder().iter().zip(outs.into_remainder()) {
            *out = self.core.ask_pattern(*pattern);
        }
    }

    #[inline]
    fn eval_group<const N: usize>(&self, group: &[TriplePattern], out: &mut [bool]) {
        let st = self.core.store();
        // loads for every lane first
        let words: [u64; N] = std::array::from_fn(|i| st.predicate_word(group[i].p, group[i].s));
        let hits: [bool; N] = std::array::from_fn(|i| (words[i] >> (group[i].s & 63)) & 1 == 1);
        for i in 0..N {
            let pat = group[i];
            out[i] = if pat.is_concrete() {
                hits[i] && st.pso_contains(pat.p, pat.s, pat.o)
            } else {
                self.core.ask_pattern(pat)
            };
        }
    }

    fn prefetch_group(&self, group: &[TriplePattern]) {
        let st = self.core.store();
        let dims = st.dims();
        for pat in group {
            if pat.p < dims.predicates && pat.s < dims.subjects {
                prefetch_read(st.predicate_row_ptr(pat.p).wrapping_add((pat.s >> 6) as usize));
            }
        }
    }
}

/// Batch over any compiled kernel, `N` lanes per group.
/// * Kernels take concrete ids only.
pub fn ask_batch_with<K: AccessKernel + ?Sized, const N: usize>(
    kernel: &K,
    patterns: &[TriplePattern],
    results: &mut [bool],
) -> Result<(), TickError> {
    check_lengths(patterns, results)?;
    let mut groups = patterns.chunks_exact(N);
    let mut outs = results.chunks_exact_mut(N);
    for (group, out) in groups.by_ref().zip(outs.by_ref()) {
        let answers: [bool; N] =
            std::array::from_fn(|i| kernel.ask_pattern(group[i].s, group[i].p, group[i].o));
        out.copy_from_slice(&answers);
    }
    for (pat, out) in groups.remainder().iter().zip(outs.into_remainder()) {
        *out = kernel.ask_pattern(pat.s, pat.p, pat.o);
    }
    Ok(())
}

fn check_lengths(patterns: &[TriplePattern], results: &[bool]) -> Result<(), TickError> {
    if patterns.len() != results.len() {
        return Err(TickError::LengthMismatch {
            expected: patterns.len(),
            actual: results.len(),
        });
    }
    Ok(())
}

//! Work splitting for the parallel `Encryptor`/`Decryptor`.
//!
//! Partitions are logical (plaintext) ranges. Every boundary except the
//! final end is a multiple of the minimum partition size, so each one starts
//! on a chunk (or block) boundary and can be processed by its own stream.

use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder};

use salmon_core::{SalmonError, SalmonResult};

/// Split `len` bytes across at most `threads` partitions of at least `min_part` bytes.
///
/// Never runs more partitions than `len / min_part`; the last partition
/// absorbs the remainder.
pub(crate) fn plan(len: u64, threads: usize, min_part: u64) -> Vec<Range<u64>> {
    let threads = threads.max(1) as u64;
    let min_part = min_part.max(1);
    if threads == 1 || len <= min_part {
        return vec![0..len];
    }

    let part = (len.div_ceil(threads) / min_part * min_part).max(min_part);
    let running = (len / part).min(threads);
    (0..running)
        .map(|i| {
            let start = i * part;
            let end = if i + 1 == running { len } else { start + part };
            start..end
        })
        .collect()
}

/// Fixed-size worker pool owned by a facade.
pub(crate) fn build_pool(threads: usize, role: &'static str) -> SalmonResult<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("salmon-{role}-{i}"))
        .build()
        .map_err(|e| SalmonError::Config(format!("failed to start {role} thread pool: {e}")))
}

/// Keep the first failure after every partition has run.
pub(crate) fn first_error(results: Vec<SalmonResult<()>>) -> SalmonResult<()> {
    let failures = results.iter().filter(|r| r.is_err()).count();
    match results.into_iter().find_map(Result::err) {
        Some(err) => {
            tracing::debug!(failures, "partitioned transform failed");
            Err(err)
        }
        None => Ok(()),
    }
}

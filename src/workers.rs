//! Bounded parallel map.
//!
//! Each operation gets its own rayon pool sized from the configured thread
//! count, so a run never uses more workers than asked for even when the
//! global pool is bigger. With one worker the items are processed in order
//! on the calling thread.

use rayon::prelude::*;

/// Apply `f` to every item on at most `threads` workers, returning results
/// in input order.
pub fn map_bounded<T, R, F>(threads: usize, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if threads <= 1 || items.len() <= 1 {
        return items.iter().map(f).collect();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(e) => {
            tracing::warn!("cannot start {threads} workers ({e}), running sequentially");
            items.iter().map(f).collect()
        }
    }
}

//! Order-preserving batch splitting.

use core::iter::FusedIterator;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero (got {0})")]
    InvalidSize(usize),
}

/// Lazy iterator over consecutive chunks of at most `size` items.
///
/// Chunks partition the input in its original order; only the last chunk may
/// be shorter than `size`.
#[derive(Debug, Clone)]
pub struct Chunks<I> {
    iter: I,
    size: usize,
}

/// Split `items` into chunks of at most `max_size`.
///
/// Empty input yields no chunks at all.
pub fn chunk<T>(items: T, max_size: usize) -> Result<Chunks<T::IntoIter>, ChunkError>
where
    T: IntoIterator,
{
    if max_size == 0 {
        return Err(ChunkError::InvalidSize(max_size));
    }

    Ok(Chunks {
        iter: items.into_iter(),
        size: max_size,
    })
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.iter.next()?;

        let (lower, _) = self.iter.size_hint();
        let mut chunk = Vec::with_capacity(self.size.min(lower.saturating_add(1)));
        chunk.push(first);
        chunk.extend(self.iter.by_ref().take(self.size - 1));

        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.iter.size_hint();
        (
            lower.div_ceil(self.size),
            upper.map(|u| u.div_ceil(self.size)),
        )
    }
}

impl<I: FusedIterator> FusedIterator for Chunks<I> {}

//! Order-preserving fixed-size batching of the vault file list

use std::path::PathBuf;

/// A contiguous group of files handed to the graph builder in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// 1-based position of this batch in the run
    pub index: usize,
    /// Total number of batches in the run
    pub total: usize,
    pub files: &'a [PathBuf],
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Number of batches needed for `len` items.
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    len.div_ceil(batch_size.max(1))
}

/// Lazily split `files` into batches of `batch_size`; the last one may be shorter.
pub fn batches(
    files: &[PathBuf],
    batch_size: usize,
) -> impl ExactSizeIterator<Item = Batch<'_>> + '_ {
    let size = batch_size.max(1);
    let total = batch_count(files.len(), size);

    files
        .chunks(size)
        .enumerate()
        .map(move |(idx, files)| Batch {
            index: idx + 1,
            total,
            files,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("note-{:03}.md", i))).collect()
    }

    #[test]
    fn twenty_three_files_in_batches_of_ten() {
        let files = paths(23);
        let sizes: Vec<usize> = batches(&files, 10).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[test]
    fn batch_count_and_sizes_hold_for_many_shapes() {
        for len in 0..40 {
            for size in 1..12 {
                let files = paths(len);
                let all: Vec<Batch<'_>> = batches(&files, size).collect();

                assert_eq!(all.len(), len.div_ceil(size), "len={len} size={size}");
                assert_eq!(all.len(), batch_count(len, size));

                for (i, batch) in all.iter().enumerate() {
                    assert_eq!(batch.index, i + 1);
                    assert_eq!(batch.total, all.len());
                    assert!(!batch.is_empty());
                    if i + 1 < all.len() {
                        assert_eq!(batch.len(), size);
                    } else {
                        let expected = if len % size == 0 { size } else { len % size };
                        assert_eq!(batch.len(), expected);
                    }
                }

                let rejoined: Vec<PathBuf> =
                    all.iter().flat_map(|b| b.files.iter().cloned()).collect();
                assert_eq!(rejoined, files);
            }
        }
    }

    #[test]
    fn empty_input_has_no_batches() {
        let files: Vec<PathBuf> = Vec::new();
        assert_eq!(batches(&files, 10).count(), 0);
        assert_eq!(batch_count(0, 10), 0);
    }

    #[test]
    fn batch_size_larger_than_input_gives_single_batch() {
        let files = paths(4);
        let all: Vec<_> = batches(&files, 100).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].files, files.as_slice());
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let files = paths(3);
        assert_eq!(batches(&files, 0).count(), 3);
    }

    #[test]
    fn reports_exact_size() {
        let files = paths(23);
        assert_eq!(batches(&files, 10).len(), 3);
    }
}

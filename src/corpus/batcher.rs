//! Regrouping frame blocks into fixed-size minibatches.

use ndarray::Array2;

/// Collects the rows of a frame stream into `(batch_size, window_size)` batches.
///
/// Rows flow across block boundaries, so one batch may mix frames from
/// several segments. Blocks whose width differs from the first block's
/// are skipped.
pub struct FrameBatcher<I> {
    inner: I,
    batch_size: usize,
    return_last_incomplete_batch: bool,
    width: Option<usize>,
    pending: Vec<f32>,
}

impl<I: Iterator<Item = Array2<f32>>> FrameBatcher<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            batch_size: 16,
            return_last_incomplete_batch: false,
            width: None,
            pending: Vec::new(),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn return_last_incomplete_batch(mut self, r: bool) -> Self {
        self.return_last_incomplete_batch = r;
        self
    }

    fn pending_rows(&self) -> usize {
        match self.width {
            Some(width) if width > 0 => self.pending.len() / width,
            _ => 0,
        }
    }

    /// Pull one block into the pending rows. Returns false once exhausted.
    fn fill(&mut self) -> bool {
        let Some(block) = self.inner.next() else {
            return false;
        };
        let width = *self.width.get_or_insert(block.ncols());
        if block.ncols() != width {
            log::warn!(
                "Skipping frame block of width {} in a batch of width {}",
                block.ncols(),
                width
            );
            return true;
        }
        self.pending.extend(block.iter().copied());
        true
    }
}

impl<I: Iterator<Item = Array2<f32>>> Iterator for FrameBatcher<I> {
    type Item = Array2<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending_rows() < self.batch_size {
            if !self.fill() {
                break;
            }
        }

        let rows = self.pending_rows().min(self.batch_size);
        if rows == 0 || (rows < self.batch_size && !self.return_last_incomplete_batch) {
            self.pending.clear();
            return None;
        }

        let width = self.width?;
        let rest = self.pending.split_off(rows * width);
        let batch = std::mem::replace(&mut self.pending, rest);
        Array2::from_shape_vec((rows, width), batch).ok()
    }
}

//! Flat in-memory vector storage.
//!
//! Vectors are stored row-major in a single contiguous buffer for cache
//! efficiency. The store only grows; the index facade owns its lifecycle
//! and clears it on `reset`.

use crate::error::{Error, Result};

/// Row-major storage of fixed-dimension `f32` vectors.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dim: usize,
    data: Vec<f32>,
}

impl VectorStore {
    /// Create an empty store for vectors of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Vector dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn ntotal(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Returns true if the store holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append row-major vectors. Returns the number of vectors added.
    pub fn add(&mut self, vectors: &[f32]) -> Result<usize> {
        if vectors.is_empty() {
            return Err(Error::invalid_arg("vectors", "cannot add zero vectors"));
        }
        if vectors.len() % self.dim != 0 {
            return Err(Error::invalid_arg(
                "vectors",
                format!(
                    "buffer length {} is not a multiple of dimension {}",
                    vectors.len(),
                    self.dim
                ),
            ));
        }
        self.data.extend_from_slice(vectors);
        Ok(vectors.len() / self.dim)
    }

    /// Borrow stored vector `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range; callers validate ids against `ntotal`.
    pub fn vector(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Discard all vectors, keeping the dimension.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_fetch() {
        let mut store = VectorStore::new(3);
        assert!(store.is_empty());

        let n = store.add(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.ntotal(), 2);
        assert_eq!(store.vector(0), &[1.0, 2.0, 3.0]);
        assert_eq!(store.vector(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_add_empty_rejected() {
        let mut store = VectorStore::new(4);
        let err = store.add(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { field, .. } if field == "vectors"));
    }

    #[test]
    fn test_add_ragged_rejected() {
        let mut store = VectorStore::new(4);
        let err = store.add(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(store.ntotal(), 0);
    }

    #[test]
    fn test_clear_keeps_dimension() {
        let mut store = VectorStore::new(2);
        store.add(&[1.0, 2.0]).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.dim(), 2);

        store.add(&[3.0, 4.0]).unwrap();
        assert_eq!(store.vector(0), &[3.0, 4.0]);
    }
}

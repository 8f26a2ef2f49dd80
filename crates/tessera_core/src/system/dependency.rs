//! # Dependency Matrix
//!
//! Square boolean matrix of "must run after" constraints between systems.

use std::fmt;

/// `get(i, j) == true` means system `i` must run after system `j`.
///
/// Grows by one row and one column per registered system.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DependencyMatrix {
    /// Number of rows (and columns).
    size: usize,
    /// Row-major cells.
    cells: Vec<bool>,
}

impl DependencyMatrix {
    /// Creates an empty matrix.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            size: 0,
            cells: Vec::new(),
        }
    }

    /// Creates a matrix of `size` systems without edges.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            cells: vec![false; size * size],
        }
    }

    /// Number of systems.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Checks whether the matrix has no systems.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Adds one system without edges and returns its index.
    pub fn grow(&mut self) -> usize {
        let old = self.size;
        let new = old + 1;
        let mut cells = vec![false; new * new];
        for row in 0..old {
            cells[row * new..row * new + old].copy_from_slice(&self.cells[row * old..(row + 1) * old]);
        }
        self.cells = cells;
        self.size = new;
        old
    }

    /// Whether `after` must run after `before`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, after: usize, before: usize) -> bool {
        assert!(after < self.size && before < self.size, "index out of range");
        self.cells[after * self.size + before]
    }

    /// Sets or clears the edge "`after` runs after `before`".
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn set(&mut self, after: usize, before: usize, value: bool) {
        assert!(after < self.size && before < self.size, "index out of range");
        self.cells[after * self.size + before] = value;
    }

    /// Whether `a` and `b` are connected in either direction.
    #[inline]
    #[must_use]
    pub fn linked(&self, a: usize, b: usize) -> bool {
        self.get(a, b) || self.get(b, a)
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

impl fmt::Debug for DependencyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DependencyMatrix({}x{})", self.size, self.size)?;
        for row in 0..self.size {
            let line: String = (0..self.size)
                .map(|col| if self.get(row, col) { '1' } else { '.' })
                .collect();
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

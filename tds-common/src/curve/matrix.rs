//! Dense row-major matrix backing a dominance curve
//!
//! Rows are attributes (the last row is the delay state), columns are
//! discretized time steps.

use crate::{Error, Result};
use std::ops::Range;

/// Row-major `rows × cols` matrix of proportions
#[derive(Debug, Clone, PartialEq)]
pub struct DominanceMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DominanceMatrix {
    /// All-zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build from nested rows; every row must have the same length
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(Error::InvalidInput(format!(
                "row {} has {} columns, expected {}",
                bad,
                rows[bad].len(),
                cols
            )));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Value at (row, column)
    ///
    /// # Panics
    /// If either index is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Set `value` over a half-open column range of one row
    pub fn fill_row(&mut self, row: usize, cols: Range<usize>, value: f64) {
        self.row_mut(row)[cols].fill(value);
    }

    /// Copy of one column, top to bottom
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for r in 0..self.rows {
            for (sum, v) in sums.iter_mut().zip(self.row(r)) {
                *sum += v;
            }
        }
        sums
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|r| self.row(r).iter().sum()).collect()
    }

    /// Element-wise `self * factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Accumulate `other * factor` into `self`; shapes must match
    pub fn add_scaled(&mut self, other: &DominanceMatrix, factor: f64) {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        for (acc, v) in self.data.iter_mut().zip(&other.data) {
            *acc += v * factor;
        }
    }

    /// Divide every column by its own sum
    ///
    /// Columns summing to zero are left as they are.
    pub fn normalize_columns(&mut self) {
        let sums = self.column_sums();
        for r in 0..self.rows {
            for (v, sum) in self.row_mut(r).iter_mut().zip(&sums) {
                if *sum != 0.0 {
                    *v /= sum;
                }
            }
        }
    }

    /// New matrix holding only the given columns, in the given order
    pub fn select_columns(&self, cols: &[usize]) -> Self {
        let mut data = Vec::with_capacity(self.rows * cols.len());
        for r in 0..self.rows {
            let row = self.row(r);
            data.extend(cols.iter().map(|&c| row[c]));
        }
        Self {
            rows: self.rows,
            cols: cols.len(),
            data,
        }
    }

    /// Replace every row with `f(row)`; all outputs must share one length
    pub fn map_rows<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        Self::from_rows((0..self.rows).map(|r| f(self.row(r))).collect())
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

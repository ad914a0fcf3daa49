//! Weight Matrix
//!
//! Dense row-major matrix holding the linear map between two adjacent
//! layers. Row `r` holds the outgoing weights of unit `r` of the lower
//! layer; column `c` holds the incoming weights of unit `c` of the upper one.

use serde::{Deserialize, Serialize};

use crate::error::{GrowthError, Result};

/// Weights between layer `i` (rows) and layer `i + 1` (columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightMatrix {
    rows: usize,
    cols: usize,
    /// Row-major values, `rows * cols` long
    data: Vec<f64>,
}

impl WeightMatrix {
    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create a square identity matrix
    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::zeros(size, size);
        for i in 0..size {
            matrix.data[i * size + i] = 1.0;
        }
        matrix
    }

    /// Create a `rows x cols` matrix with ones on the leading diagonal
    /// and zeros elsewhere.
    pub fn identity_padded(rows: usize, cols: usize) -> Self {
        let mut matrix = Self::zeros(rows, cols);
        for i in 0..rows.min(cols) {
            matrix.data[i * cols + i] = 1.0;
        }
        matrix
    }

    /// Wrap row-major values.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(GrowthError::invalid(format!(
                "{} values cannot fill a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from explicit rows, which must all have equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(GrowthError::invalid(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                cols
            )));
        }

        let row_count = rows.len();
        let data = rows.into_iter().flatten().collect();
        Ok(Self {
            rows: row_count,
            cols,
            data,
        })
    }

    /// Number of rows (width of the lower layer)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (width of the upper layer)
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Raw row-major values
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable raw row-major values
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Borrow one row
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate over rows
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics; a zero-column matrix has no row data anyway
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Copy one column
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|row| self.get(row, col)).collect()
    }

    /// Return a copy with `columns` appended as new columns, in order.
    ///
    /// Existing columns keep their position.
    pub fn with_appended_columns(&self, columns: &[usize]) -> Self {
        let cols = self.cols + columns.len();
        let mut data = Vec::with_capacity(self.rows * cols);

        for row in self.iter_rows() {
            data.extend_from_slice(row);
            data.extend(columns.iter().map(|&col| row[col]));
        }

        Self {
            rows: self.rows,
            cols,
            data,
        }
    }

    /// Divide every value of `row` by `divisor`
    pub fn scale_row(&mut self, row: usize, divisor: f64) {
        let cols = self.cols;
        for value in &mut self.data[row * cols..(row + 1) * cols] {
            *value /= divisor;
        }
    }

    /// Append a copy of an existing row at the bottom
    pub fn push_row_copy(&mut self, row: usize) {
        let start = row * self.cols;
        self.data.extend_from_within(start..start + self.cols);
        self.rows += 1;
    }

    /// Row vector times matrix: `out[c] = sum_r input[r] * self[r][c]`
    ///
    /// # Errors
    /// `InvalidArgument` if `input` does not hold exactly `rows` values.
    pub fn left_multiply(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.rows {
            return Err(GrowthError::invalid(format!(
                "input has {} values, matrix has {} rows",
                input.len(),
                self.rows
            )));
        }

        let mut out = vec![0.0; self.cols];
        for (&x, row) in input.iter().zip(self.iter_rows()) {
            if x == 0.0 {
                continue;
            }
            for (acc, &w) in out.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        Ok(out)
    }
}

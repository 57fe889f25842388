use std::fmt;
use std::mem;

use pmm_shm::SharedRegion;

use crate::error::{KernelError, Result};
use crate::partition::RowRange;

/// Largest dimension for which matrices are printed.
pub const DUMP_MAX_DIM: usize = 10;

/// Size in bytes of a `dim`x`dim` matrix of `f64`.
///
/// # Errors
/// `TooLarge` if the size overflows or exceeds `isize::MAX`, the limit for
/// any single allocation or slice.
pub fn matrix_bytes(dim: usize) -> Result<usize> {
    dim.checked_mul(dim)
        .and_then(|n| n.checked_mul(mem::size_of::<f64>()))
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or(KernelError::TooLarge { dim })
}

/// Resolve a region to an `f64` pointer holding at least `dim * dim` values.
fn region_ptr(region: &SharedRegion, dim: usize) -> Result<*mut f64> {
    if dim == 0 {
        return Err(KernelError::ZeroDimension);
    }
    let needed = matrix_bytes(dim)?;
    let ptr = region.as_ptr()?;
    if region.len() < needed {
        return Err(KernelError::BufferTooSmall {
            dim,
            needed,
            got: region.len(),
        });
    }
    if ptr as usize % mem::align_of::<f64>() != 0 {
        return Err(KernelError::Misaligned);
    }
    Ok(ptr as *mut f64)
}

fn check_len(len: usize, dim: usize) -> Result<()> {
    if dim == 0 {
        return Err(KernelError::ZeroDimension);
    }
    if dim.checked_mul(dim) != Some(len) {
        return Err(KernelError::LengthMismatch { dim, got: len });
    }
    Ok(())
}

/// Read-only view of a square, row-major `f64` matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: &'a [f64],
    dim: usize,
}

impl<'a> MatrixView<'a> {
    /// View `data` as a `dim`x`dim` matrix.
    ///
    /// # Errors
    /// Returns an error if `data.len() != dim * dim`.
    pub fn from_slice(data: &'a [f64], dim: usize) -> Result<Self> {
        check_len(data.len(), dim)?;
        Ok(MatrixView { data, dim })
    }

    /// View the first `dim * dim` values of a shared region.
    ///
    /// # Safety
    /// Nothing may write to the region (through any attachment, in any
    /// process) while the returned view is alive.
    pub unsafe fn from_region(region: &'a SharedRegion, dim: usize) -> Result<Self> {
        let ptr = region_ptr(region, dim)?;
        // `region_ptr` bounds `dim * dim * 8` by `isize::MAX`.
        let data = unsafe { std::slice::from_raw_parts(ptr as *const f64, dim * dim) };
        Ok(MatrixView { data, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }

    /// Element at row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if `i` or `j` is not below `dim`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(
            i < self.dim && j < self.dim,
            "index ({}, {}) out of bounds for {}x{} matrix",
            i,
            j,
            self.dim,
            self.dim
        );
        self.data[i * self.dim + j]
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    /// Panics if `i >= dim`.
    pub fn row(&self, i: usize) -> &'a [f64] {
        assert!(i < self.dim, "row {} out of bounds for dimension {}", i, self.dim);
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Human-readable grid: six decimals per value, space separated, one row
    /// per line. Intended for matrices up to [`DUMP_MAX_DIM`].
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MatrixView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.dim {
            for v in self.row(i) {
                write!(f, "{:.6} ", v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Writable view over a window of rows of a square, row-major `f64` matrix.
///
/// Indices are always global (row `i` of the whole matrix); only rows inside
/// the window can be accessed. A full view has the window `[0, dim)`.
#[derive(Debug)]
pub struct MatrixViewMut<'a> {
    data: &'a mut [f64],
    dim: usize,
    rows: RowRange,
}

impl<'a> MatrixViewMut<'a> {
    /// View `data` as a whole `dim`x`dim` matrix.
    pub fn from_slice_mut(data: &'a mut [f64], dim: usize) -> Result<Self> {
        check_len(data.len(), dim)?;
        Ok(MatrixViewMut {
            data,
            dim,
            rows: RowRange::new(0, dim),
        })
    }

    /// View `data` as rows `rows` of a `dim`x`dim` matrix.
    ///
    /// `data` holds only the window: `rows.len() * dim` values starting at
    /// row `rows.start`.
    pub fn from_rows_mut(data: &'a mut [f64], dim: usize, rows: RowRange) -> Result<Self> {
        if dim == 0 {
            return Err(KernelError::ZeroDimension);
        }
        if rows.start > rows.end || rows.end > dim {
            return Err(KernelError::RowRangeOutOfBounds {
                start: rows.start,
                end: rows.end,
                dim,
            });
        }
        if rows.len().checked_mul(dim) != Some(data.len()) {
            return Err(KernelError::LengthMismatch {
                dim,
                got: data.len(),
            });
        }
        Ok(MatrixViewMut { data, dim, rows })
    }

    /// View a shared region as a whole `dim`x`dim` matrix.
    ///
    /// # Safety
    /// No other attachment of the region may read or write it while the
    /// returned view is alive.
    pub unsafe fn from_region(region: &'a mut SharedRegion, dim: usize) -> Result<Self> {
        unsafe { Self::rows_of_region(region, dim, RowRange::new(0, dim)) }
    }

    /// View only `rows` of a shared region holding a `dim`x`dim` matrix.
    ///
    /// # Safety
    /// No other attachment of the region may access the rows in `rows` while
    /// the returned view is alive. Other rows may be used concurrently by
    /// other views.
    pub unsafe fn rows_of_region(
        region: &'a mut SharedRegion,
        dim: usize,
        rows: RowRange,
    ) -> Result<Self> {
        let ptr = region_ptr(region, dim)?;
        if rows.start > rows.end || rows.end > dim {
            return Err(KernelError::RowRangeOutOfBounds {
                start: rows.start,
                end: rows.end,
                dim,
            });
        }
        let data = unsafe {
            std::slice::from_raw_parts_mut(ptr.add(rows.start * dim), rows.len() * dim)
        };
        Ok(MatrixViewMut { data, dim, rows })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Rows covered by this view.
    pub fn rows(&self) -> RowRange {
        self.rows
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data
    }

    /// The window's values, starting at row `rows().start`.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            self.rows.contains(i) && j < self.dim,
            "index ({}, {}) outside rows {} of {}x{} matrix",
            i,
            j,
            self.rows,
            self.dim,
            self.dim
        );
        (i - self.rows.start) * self.dim + j
    }

    /// Element at global row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if `i` is outside the window or `j >= dim`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.offset(i, j)]
    }

    /// Set the element at global row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if `i` is outside the window or `j >= dim`.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.offset(i, j);
        self.data[idx] = value;
    }

    /// Global row `i` as a mutable slice.
    ///
    /// # Panics
    /// Panics if `i` is outside the window.
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let start = self.offset(i, 0);
        &mut self.data[start..start + self.dim]
    }

    /// Write `value` to every element in the window.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }
}

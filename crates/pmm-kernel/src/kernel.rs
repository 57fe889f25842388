use crate::error::{KernelError, Result};
use crate::view::{MatrixView, MatrixViewMut};

/// Compute the rows of `C = A @ B` covered by `c`'s window.
///
/// For each row `i` in `c.rows()` and each column `j`:
///   `C[i, j] = sum over k in 0..n of A[i, k] * B[k, j]`
///
/// Summation runs with `k` ascending from `0.0`, so a given element has the
/// same bits no matter how the rows are split between workers. Rows outside
/// the window are neither read from nor written to `c`.
pub fn multiply_rows(
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    c: &mut MatrixViewMut<'_>,
) -> Result<()> {
    let n = a.dim();
    if b.dim() != n || c.dim() != n {
        return Err(KernelError::DimensionMismatch {
            a: n,
            b: b.dim(),
            c: c.dim(),
        });
    }

    let b_data = b.as_slice();
    for i in c.rows().iter() {
        let a_row = a.row(i);
        let c_row = c.row_mut(i);
        for (j, out) in c_row.iter_mut().enumerate() {
            let mut sum = 0.0f64;
            for (k, &a_ik) in a_row.iter().enumerate() {
                sum += a_ik * b_data[k * n + j];
            }
            *out = sum;
        }
    }
    Ok(())
}

/// Full product `A @ B` into a fresh vector, using the same kernel.
pub fn multiply(a: &MatrixView<'_>, b: &MatrixView<'_>) -> Result<Vec<f64>> {
    let n = a.dim();
    let mut out = vec![0.0f64; n * n];
    let mut c = MatrixViewMut::from_slice_mut(&mut out, n)?;
    multiply_rows(a, b, &mut c)?;
    Ok(out)
}

/// First element of `view` that is not exactly `expected`, as `(row, col, value)`.
pub fn first_mismatch(view: &MatrixView<'_>, expected: f64) -> Option<(usize, usize, f64)> {
    let n = view.dim();
    view.as_slice()
        .iter()
        .position(|&v| v != expected)
        .map(|idx| (idx / n, idx % n, view.as_slice()[idx]))
}

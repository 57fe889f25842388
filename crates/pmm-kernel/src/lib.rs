//! `pmm-kernel` - Matrix views, partitioning, and compute for pmm.
//!
//! This crate provides:
//! - `MatrixView` / `MatrixViewMut`, square row-major `f64` overlays on
//!   slices or shared regions
//! - `PartitionPlan`, the static assignment of output rows to workers
//! - `multiply_rows`, the dot-product kernel filling one worker's rows

pub mod error;
pub mod kernel;
pub mod partition;
pub mod view;

// Re-export primary types at the crate root for convenience.
pub use error::{KernelError, Result};
pub use kernel::{first_mismatch, multiply, multiply_rows};
pub use partition::{row_range, PartitionPlan, RowRange};
pub use view::{matrix_bytes, MatrixView, MatrixViewMut, DUMP_MAX_DIM};

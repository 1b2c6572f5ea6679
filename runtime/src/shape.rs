//! Shape table reconstruction.
//!
//! The host flattens all argument shapes into one rectangular row-major table of
//! `num_args × max(dim_count)` entries. Rows of lower-rank arguments are padded; padding is never read.
//! The width depends on the arguments of the current call, so it is recomputed every time.

use crate::error::{DecodeSnafu, Result};

/// Width of the shape table: the largest dimension count among all arguments.
pub fn table_width(dim_counts: &[u32]) -> usize {
    dim_counts.iter().copied().max().unwrap_or(0) as usize
}

/// Number of entries the flattened table holds for these dimension counts.
pub fn table_len(dim_counts: &[u32]) -> Result<usize> {
    dim_counts.len().checked_mul(table_width(dim_counts)).ok_or_else(|| {
        DecodeSnafu { reason: format!("shape table of {} rows overflows", dim_counts.len()) }.build()
    })
}

/// Row-major view over a flattened shape table.
#[derive(Debug, Clone, Copy)]
pub struct ShapeTable<'a> {
    flat: &'a [u32],
    dim_counts: &'a [u32],
    width: usize,
}

impl<'a> ShapeTable<'a> {
    pub fn new(flat: &'a [u32], dim_counts: &'a [u32]) -> Result<Self> {
        let width = table_width(dim_counts);
        let expected = table_len(dim_counts)?;
        snafu::ensure!(
            flat.len() == expected,
            DecodeSnafu {
                reason: format!(
                    "shape table has {} entries, expected {} rows x {width} columns",
                    flat.len(),
                    dim_counts.len()
                )
            }
        );
        Ok(Self { flat, dim_counts, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        self.dim_counts.len()
    }

    /// Full row `index`, padding included.
    pub fn row(&self, index: usize) -> &'a [u32] {
        &self.flat[index * self.width..(index + 1) * self.width]
    }

    /// Effective shape of argument `index`: its row truncated to its own dimension count.
    pub fn shape(&self, index: usize) -> &'a [u32] {
        &self.row(index)[..self.dim_counts[index] as usize]
    }

    pub fn shapes(&self) -> impl Iterator<Item = &'a [u32]> + 'a {
        let table = *self;
        (0..table.rows()).map(move |index| table.shape(index))
    }
}

//! Topic matrix module for ALICE-PLSA
//!
//! Dense `rows × topics` tables stored row-major. One row per word (or
//! document), one column per topic, so the per-observation inner loop over
//! topics walks contiguous memory.

use crate::{ALICEPLSAError, Result};
use serde::{Deserialize, Serialize};

/// Row-major `rows × topics` table of probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMatrix {
    rows: usize,
    topics: usize,
    data: Vec<f64>,
}

impl TopicMatrix {
    /// Allocate a zero-filled matrix.
    ///
    /// Fails with [`ALICEPLSAError::AllocationFailure`] when `rows * topics`
    /// overflows or the allocator refuses the reservation.
    pub fn zeros(table: &'static str, rows: usize, topics: usize) -> Result<Self> {
        let elements = rows
            .checked_mul(topics)
            .ok_or(ALICEPLSAError::AllocationFailure {
                table,
                elements: usize::MAX,
            })?;
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|_| ALICEPLSAError::AllocationFailure { table, elements })?;
        data.resize(elements, 0.0);
        Ok(Self { rows, topics, data })
    }

    /// Build from row-major data
    pub fn from_vec(rows: usize, topics: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(topics) != Some(data.len()) {
            return Err(ALICEPLSAError::InvalidConfiguration(format!(
                "matrix data has {} elements, expected {} x {}",
                data.len(),
                rows,
                topics
            )));
        }
        Ok(Self { rows, topics, data })
    }

    /// Build from nested rows (one inner `Vec` per row)
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let topics = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * topics);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != topics {
                return Err(ALICEPLSAError::InvalidConfiguration(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    topics
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            topics,
            data,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn topics(&self) -> usize {
        self.topics
    }

    /// Bounds-checked read
    #[inline]
    pub fn get(&self, row: usize, topic: usize) -> Option<f64> {
        if row < self.rows && topic < self.topics {
            Some(self.data[row * self.topics + topic])
        } else {
            None
        }
    }

    /// Bounds-checked write, returns `false` when out of range
    #[inline]
    pub fn set(&mut self, row: usize, topic: usize, value: f64) -> bool {
        if row < self.rows && topic < self.topics {
            self.data[row * self.topics + topic] = value;
            true
        } else {
            false
        }
    }

    /// All topic entries of one row.
    ///
    /// # Panics
    /// Panics if `row >= self.rows()`.
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.topics;
        &self.data[start..start + self.topics]
    }

    /// Mutable topic entries of one row.
    ///
    /// # Panics
    /// Panics if `row >= self.rows()`.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.topics;
        &mut self.data[start..start + self.topics]
    }

    /// Iterate one topic column top to bottom
    pub fn column(&self, topic: usize) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .skip(topic)
            .step_by(self.topics.max(1))
            .copied()
            .take(if topic < self.topics { self.rows } else { 0 })
    }

    /// Mutable iterator over one topic column
    pub fn column_mut(&mut self, topic: usize) -> impl Iterator<Item = &mut f64> + '_ {
        let rows = if topic < self.topics { self.rows } else { 0 };
        let stride = self.topics.max(1);
        self.data.iter_mut().skip(topic).step_by(stride).take(rows)
    }

    /// Sum of one topic column
    pub fn column_sum(&self, topic: usize) -> f64 {
        self.column(topic).sum()
    }

    /// Reset every entry to zero without reallocating
    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Elementwise `self += other`, shapes must match
    pub fn add_assign(&mut self, other: &TopicMatrix) {
        debug_assert_eq!(self.data.len(), other.data.len());
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += *b;
        }
    }

    /// Sum of absolute elementwise differences
    pub fn l1_distance(&self, other: &TopicMatrix) -> f64 {
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .sum()
    }

    /// Raw row-major storage
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Data length agrees with the stated dimensions
    pub fn is_well_formed(&self) -> bool {
        self.rows.checked_mul(self.topics) == Some(self.data.len())
    }

    pub fn same_shape(&self, other: &TopicMatrix) -> bool {
        self.rows == other.rows && self.topics == other.topics
    }
}

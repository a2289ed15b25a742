//! Sparse corpus module for ALICE-PLSA
//!
//! Holds the nonzero word/document co-occurrence counts a model is fit to.

use crate::{ALICEPLSAError, Axis, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A single nonzero term-document observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Word index in `[0, n_words)`
    pub word: u32,
    /// Document index in `[0, n_docs)`
    pub doc: u32,
    /// Occurrences of `word` in `doc`
    pub count: u32,
}

impl Observation {
    pub fn new(word: u32, doc: u32, count: u32) -> Self {
        Self { word, doc, count }
    }
}

/// Immutable sparse view over a term-document count matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparseCorpus {
    n_words: usize,
    n_docs: usize,
    observations: Vec<Observation>,
    total_count: u64,
}

impl SparseCorpus {
    /// Build a corpus, validating every index against the declared bounds.
    ///
    /// Zero counts are dropped. The first out-of-range index fails with
    /// [`ALICEPLSAError::IndexOutOfRange`].
    pub fn new(n_words: usize, n_docs: usize, observations: Vec<Observation>) -> Result<Self> {
        let mut kept = Vec::with_capacity(observations.len());
        let mut total_count = 0u64;

        for (position, obs) in observations.into_iter().enumerate() {
            if obs.word as usize >= n_words {
                return Err(ALICEPLSAError::IndexOutOfRange {
                    axis: Axis::Word,
                    index: obs.word as usize,
                    bound: n_words,
                    position,
                });
            }
            if obs.doc as usize >= n_docs {
                return Err(ALICEPLSAError::IndexOutOfRange {
                    axis: Axis::Document,
                    index: obs.doc as usize,
                    bound: n_docs,
                    position,
                });
            }
            if obs.count == 0 {
                continue;
            }
            total_count += u64::from(obs.count);
            kept.push(obs);
        }

        Ok(Self {
            n_words,
            n_docs,
            observations: kept,
            total_count,
        })
    }

    /// Build from `(word, doc, count)` triples
    pub fn from_triples(n_words: usize, n_docs: usize, triples: &[(u32, u32, u32)]) -> Result<Self> {
        let observations = triples
            .iter()
            .map(|&(word, doc, count)| Observation::new(word, doc, count))
            .collect();
        Self::new(n_words, n_docs, observations)
    }

    /// Build from a dense `V × D` term-document matrix (`td[word][doc]`)
    pub fn from_term_document(td: &[Vec<u32>]) -> Result<Self> {
        let n_words = td.len();
        let n_docs = td.first().map_or(0, Vec::len);
        let mut observations = Vec::new();

        for (word, row) in td.iter().enumerate() {
            if row.len() != n_docs {
                return Err(ALICEPLSAError::InvalidConfiguration(format!(
                    "term-document row {} has {} documents, expected {}",
                    word,
                    row.len(),
                    n_docs
                )));
            }
            for (doc, &count) in row.iter().enumerate() {
                if count > 0 {
                    observations.push(Observation::new(
                        index_u32(word, Axis::Word)?,
                        index_u32(doc, Axis::Document)?,
                        count,
                    ));
                }
            }
        }

        Self::new(n_words, n_docs, observations)
    }

    /// Parse the plain-text triple format.
    ///
    /// ```text
    /// # comment
    /// n_words n_docs
    /// word doc count
    /// ...
    /// ```
    pub fn from_triple_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut dims: Option<(usize, usize)> = None;
        let mut observations = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();

            match dims {
                None => {
                    if fields.len() != 2 {
                        return Err(malformed(lineno, "expected `n_words n_docs`"));
                    }
                    dims = Some((parse_field(fields[0], lineno)?, parse_field(fields[1], lineno)?));
                }
                Some(_) => {
                    if fields.len() != 3 {
                        return Err(malformed(lineno, "expected `word doc count`"));
                    }
                    observations.push(Observation::new(
                        parse_field(fields[0], lineno)?,
                        parse_field(fields[1], lineno)?,
                        parse_field(fields[2], lineno)?,
                    ));
                }
            }
        }

        let (n_words, n_docs) =
            dims.ok_or_else(|| malformed(0, "missing `n_words n_docs` line"))?;
        Self::new(n_words, n_docs, observations)
    }

    pub fn from_triple_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_triple_reader(BufReader::new(file))
    }

    /// Total token occurrences `R`
    #[inline]
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Vocabulary size `n_w`
    #[inline]
    pub fn n_words(&self) -> usize {
        self.n_words
    }

    /// Number of documents `n_d`
    #[inline]
    pub fn n_docs(&self) -> usize {
        self.n_docs
    }

    /// Number of stored observations `n_ele`
    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    #[inline]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Total count per word
    pub fn word_counts(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.n_words];
        for obs in &self.observations {
            counts[obs.word as usize] += u64::from(obs.count);
        }
        counts
    }

    /// Total count per document
    pub fn doc_counts(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.n_docs];
        for obs in &self.observations {
            counts[obs.doc as usize] += u64::from(obs.count);
        }
        counts
    }
}

impl<'a> IntoIterator for &'a SparseCorpus {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

fn index_u32(index: usize, axis: Axis) -> Result<u32> {
    u32::try_from(index).map_err(|_| {
        ALICEPLSAError::InvalidConfiguration(format!("{} index {} exceeds u32", axis, index))
    })
}

fn malformed(lineno: usize, what: &str) -> ALICEPLSAError {
    ALICEPLSAError::InvalidConfiguration(format!("triple file line {}: {}", lineno + 1, what))
}

fn parse_field<T: std::str::FromStr>(field: &str, lineno: usize) -> Result<T> {
    field
        .parse()
        .map_err(|_| malformed(lineno, &format!("cannot parse `{}`", field)))
}

//! Loading of the consequence severity vocabulary.
//!
//! The vocabulary file is a TSV file with a header line.  The first column of each remaining
//! line holds a Sequence Ontology term; the line order gives the severity rank, most severe
//! first.  Further columns (accession, impact, ...) are ignored.

use std::{io::Read, path::Path};

use crate::error::Error;

/// Maximal length of a single vocabulary term.
pub const MAX_TERM_LEN: usize = 1024;

/// One term of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityTerm {
    /// The bare term, e.g., `stop_gained`.
    term: String,
    /// The term wrapped in double quotes, e.g., `"stop_gained"`.
    quoted: String,
}

impl SeverityTerm {
    /// Construct a new term, rejecting empty and overlong terms.
    pub fn new(term: &str) -> Result<Self, Error> {
        let term = term.trim();
        if term.is_empty() {
            return Err(Error::Config(String::from("empty severity term")));
        }
        if term.len() > MAX_TERM_LEN {
            return Err(Error::Config(format!(
                "severity term of length {} exceeds maximum of {} characters",
                term.len(),
                MAX_TERM_LEN
            )));
        }
        Ok(Self {
            term: term.to_string(),
            quoted: format!("\"{}\"", term),
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn quoted(&self) -> &str {
        &self.quoted
    }
}

/// Consequence terms ordered from most to least severe.
///
/// The index of a term is its severity rank.  The vocabulary is read-only after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityVocabulary {
    terms: Vec<SeverityTerm>,
}

impl SeverityVocabulary {
    /// Load the vocabulary from the TSV file at `path`.
    pub fn from_path<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "could not open severity vocabulary {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_reader(file)
    }

    /// Load the vocabulary from TSV data, skipping the header line.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut terms = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| {
                Error::Config(format!("problem reading severity vocabulary: {}", e))
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let term = record.get(0).unwrap_or_default();
            terms.push(SeverityTerm::new(term).map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("{} (line {})", msg, line)),
                e => e,
            })?);
        }

        Ok(Self { terms })
    }

    /// Build a vocabulary from terms given in severity order.
    pub fn from_terms<I, S>(terms: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            terms: terms
                .into_iter()
                .map(|term| SeverityTerm::new(term.as_ref()))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The term with the given severity rank.
    pub fn get(&self, rank: usize) -> Option<&SeverityTerm> {
        self.terms.get(rank)
    }

    /// Iterate over the terms, most severe first.
    pub fn iter(&self) -> impl Iterator<Item = &SeverityTerm> {
        self.terms.iter()
    }
}

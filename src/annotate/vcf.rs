//! Parsing of VCF data lines into per-variant records.
//!
//! Only the columns needed for annotation are kept.  The line is expected to carry a normal and
//! a tumor sample; the tumor sample (11th column) is the one whose values are decoded.  Further
//! sample columns are ignored.

use std::{fmt::Display, str::FromStr};

use crate::error::Error;

/// Number of tab-separated columns a data line must have.
pub const EXPECTED_COLUMNS: usize = 11;

/// Column index of the tumor sample.
const TUMOR_SAMPLE_COLUMN: usize = 10;

/// Key of the INFO entry holding the comma-separated variant types.
const INFO_TYPE_KEY: &str = "TYPE=";

/// A VCF data line as needed for annotation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantRecord {
    /// Chromosome name.
    pub chromosome: String,
    /// 1-based position of the first base of `reference`.
    pub position: u64,
    /// Reference bases.
    pub reference: String,
    /// Alternate alleles in ALT order; never empty.
    pub alternates: Vec<String>,
    /// The raw INFO column.
    pub info: String,
    /// Keys of the FORMAT column.
    pub format_keys: Vec<String>,
    /// Values of the tumor sample, aligned with `format_keys`.
    pub sample_values: Vec<String>,
    /// Variant types from INFO `TYPE`, aligned with `alternates` when present.
    pub variant_types: Vec<String>,
}

/// A single-allele variant description how VCF would do it.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct VcfVariant {
    /// Chromosome name.
    pub chromosome: String,
    /// 1-based position on the chromosome of first base of `reference`.
    pub position: u64,
    /// Reference bases.
    pub reference: String,
    /// Alternative bases.
    pub alternative: String,
}

impl Display for VcfVariant {
    /// Formats as `{chrom}-{pos}-{ref}-{alt}`, the variant key of the remote service.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.chromosome, self.position, self.reference, self.alternative
        )
    }
}

impl VariantRecord {
    /// The single-allele variant for the alternate allele with the given 0-based index.
    pub fn vcf_variant(&self, allele_idx: usize) -> Option<VcfVariant> {
        self.alternates.get(allele_idx).map(|alternative| VcfVariant {
            chromosome: self.chromosome.clone(),
            position: self.position,
            reference: self.reference.clone(),
            alternative: alternative.clone(),
        })
    }

    /// The single-allele variants of all alternate alleles, in ALT order.
    pub fn vcf_variants(&self) -> impl Iterator<Item = VcfVariant> + '_ {
        (0..self.alternates.len()).filter_map(|allele_idx| self.vcf_variant(allele_idx))
    }

    /// Variant type of the allele with the given 0-based index, if any.
    ///
    /// INFO may lack `TYPE` or list fewer types than there are alleles.
    pub fn variant_type(&self, allele_idx: usize) -> Option<&str> {
        self.variant_types.get(allele_idx).map(String::as_str)
    }

    /// Whether the number of types matches the number of alternate alleles.
    pub fn variant_types_match_alternates(&self) -> bool {
        self.variant_types.len() == self.alternates.len()
    }
}

/// Split `value` on `sep`, dropping empty tokens.
fn split_non_empty(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// Split a FORMAT or SAMPLE column; empty tokens are kept so both stay aligned.
fn split_colons(value: &str) -> Vec<String> {
    value.split(':').map(String::from).collect()
}

/// Extract the variant types from the INFO column.
fn parse_variant_types(info: &str) -> Vec<String> {
    info.split(';')
        .find_map(|entry| entry.strip_prefix(INFO_TYPE_KEY))
        .map(|value| split_non_empty(value, ','))
        .unwrap_or_default()
}

impl FromStr for VariantRecord {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < EXPECTED_COLUMNS {
            return Err(Error::Parse(format!(
                "expected {} tab-separated columns but found {}",
                EXPECTED_COLUMNS,
                fields.len()
            )));
        }

        let position = fields[1]
            .parse::<u64>()
            .map_err(|e| Error::Parse(format!("invalid position {:?}: {}", fields[1], e)))?;

        let alternates = if fields[4] == "." {
            Vec::new()
        } else {
            split_non_empty(fields[4], ',')
        };
        if alternates.is_empty() {
            return Err(Error::Parse(format!(
                "no alternate alleles in ALT column {:?}",
                fields[4]
            )));
        }

        Ok(Self {
            chromosome: fields[0].to_string(),
            position,
            reference: fields[3].to_string(),
            alternates,
            info: fields[7].to_string(),
            format_keys: split_colons(fields[8]),
            sample_values: split_colons(fields[TUMOR_SAMPLE_COLUMN]),
            variant_types: parse_variant_types(fields[7]),
        })
    }
}

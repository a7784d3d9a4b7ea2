//! Resolution of FORMAT keys to SAMPLE values.
//!
//! The column positions of the depth keys are computed once from the first data record and
//! reused for all later records.  A file is assumed to use a single FORMAT layout; records
//! deviating from it can be detected with `FormatColumnIndex::matches_layout()`.

/// Names of the FORMAT keys holding the depth counters.
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder)]
#[builder(pattern = "immutable", default)]
pub struct FormatKeys {
    /// Total read depth.
    pub depth: String,
    /// Per-allele observation counts, reference first.
    pub allele_depths: String,
    /// Reference allele observation count.
    pub reference_observations: String,
}

impl Default for FormatKeys {
    fn default() -> Self {
        Self {
            depth: String::from("DP"),
            allele_depths: String::from("DPR"),
            reference_observations: String::from("RO"),
        }
    }
}

/// Depth counters decoded from one sample.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleDepths {
    /// Total read depth, 0 if not available.
    pub dp: u32,
    /// Observation counts per allele, index 0 is the reference.
    pub dpr: Vec<u32>,
    /// Reference observation count, 0 if not available.
    pub ro: u32,
}

impl SampleDepths {
    /// Reads supporting the alternate allele with the given 0-based index.
    ///
    /// DPR is assumed to list the reference first and then the alternate alleles in ALT
    /// order, so the allele is found at `allele_idx + 1`.
    pub fn allele_support(&self, allele_idx: usize) -> Option<u32> {
        self.dpr.get(allele_idx + 1).copied()
    }
}

/// Zero-based positions of the depth keys in the FORMAT column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatColumnIndex {
    /// The FORMAT layout the index was computed from.
    layout: Vec<String>,
    dp: Option<usize>,
    dpr: Option<usize>,
    ro: Option<usize>,
}

/// Parse the leading digits of a counter like `atoi` does; no digits at all yield 0.
fn parse_count(value: &str) -> u32 {
    let trimmed = value.trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..digits].parse::<u32>().unwrap_or_else(|_| {
        tracing::trace!("treating non-numeric depth value {:?} as 0", value);
        0
    })
}

impl FormatColumnIndex {
    /// Resolve the positions of the keys named in `keys` within `format_keys`.
    pub fn resolve(format_keys: &[String], keys: &FormatKeys) -> Self {
        let position = |name: &str| format_keys.iter().position(|key| key == name);
        Self {
            layout: format_keys.to_vec(),
            dp: position(&keys.depth),
            dpr: position(&keys.allele_depths),
            ro: position(&keys.reference_observations),
        }
    }

    pub fn dp(&self) -> Option<usize> {
        self.dp
    }

    pub fn dpr(&self) -> Option<usize> {
        self.dpr
    }

    pub fn ro(&self) -> Option<usize> {
        self.ro
    }

    /// Whether `format_keys` has the same layout as the record the index was computed from.
    pub fn matches_layout(&self, format_keys: &[String]) -> bool {
        self.layout == format_keys
    }

    /// Decode the depth counters from the sample values.
    ///
    /// Missing keys or values yield 0 for DP and RO and an empty DPR list.
    pub fn extract(&self, sample_values: &[String]) -> SampleDepths {
        let value = |idx: Option<usize>| idx.and_then(|idx| sample_values.get(idx));

        let dpr = match value(self.dpr).map(String::as_str) {
            None | Some("") | Some(".") => Vec::new(),
            Some(dpr) => dpr.split(',').map(parse_count).collect(),
        };

        SampleDepths {
            dp: value(self.dp).map(|v| parse_count(v)).unwrap_or_default(),
            dpr,
            ro: value(self.ro).map(|v| parse_count(v)).unwrap_or_default(),
        }
    }
}

//! Assembly and writing of the annotation TSV rows.

use std::io::Write;

use super::depth::DepthStats;
use super::format::SampleDepths;
use super::vcf::VariantRecord;
use super::SENTINEL;

/// Column titles of the output file.
pub const HEADER: [&str; 10] = [
    "Chromosome",
    "Position",
    "Ref",
    "Alt",
    "Depth (VCF DP format field)",
    "Reads supporting Alt (VCF DPR format field)",
    "Percent Reads supporting Alt vs. Reads supporting Ref (VCF)",
    "Allele Frequency (EXAC)",
    "Variant Type (VCF TYPE info field)",
    "Variant Type/Consequence (EXAC)",
];

/// One output row, describing one alternate allele of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    pub chromosome: String,
    pub position: u64,
    pub reference: String,
    pub alternative: String,
    /// Total read depth (DP).
    pub depth: u32,
    /// Read support statistics of the allele.
    pub stats: DepthStats,
    /// Population allele frequency, or the sentinel.
    pub allele_frequency: String,
    /// Variant type from INFO `TYPE`, if listed for the allele.
    pub variant_type: Option<String>,
    /// Most severe consequence, or the sentinel.
    pub consequence: String,
}

impl AnnotationRow {
    /// Combine the data of the allele with the given 0-based index into a row.
    pub fn assemble(
        record: &VariantRecord,
        allele_idx: usize,
        depths: &SampleDepths,
        allele_frequency: String,
        consequence: String,
    ) -> Self {
        Self {
            chromosome: record.chromosome.clone(),
            position: record.position,
            reference: record.reference.clone(),
            alternative: record
                .alternates
                .get(allele_idx)
                .cloned()
                .unwrap_or_else(|| String::from(SENTINEL)),
            depth: depths.dp,
            stats: DepthStats::for_allele(depths, allele_idx),
            allele_frequency,
            variant_type: record.variant_type(allele_idx).map(String::from),
            consequence,
        }
    }

    /// The row's fields in output column order.
    pub fn fields(&self) -> [String; 10] {
        let sentinel = || String::from(SENTINEL);
        [
            self.chromosome.clone(),
            self.position.to_string(),
            self.reference.clone(),
            self.alternative.clone(),
            self.depth.to_string(),
            self.stats
                .allele_support
                .map(|support| support.to_string())
                .unwrap_or_else(sentinel),
            self.stats
                .support_percent
                .map(|percent| format!("{:.6}", percent))
                .unwrap_or_else(sentinel),
            self.allele_frequency.clone(),
            self.variant_type.clone().unwrap_or_else(sentinel),
            self.consequence.clone(),
        ]
    }
}

/// Writer for the annotation TSV file.
pub struct AnnotationWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AnnotationWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .delimiter(b'\t')
                .quote_style(csv::QuoteStyle::Never)
                .has_headers(false)
                .from_writer(inner),
        }
    }

    pub fn write_header(&mut self) -> Result<(), anyhow::Error> {
        self.writer.write_record(HEADER)?;
        Ok(())
    }

    pub fn write_row(&mut self, row: &AnnotationRow) -> Result<(), anyhow::Error> {
        self.writer.write_record(row.fields())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), anyhow::Error> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, anyhow::Error> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("problem flushing annotation writer: {}", e))
    }
}

//! Annotation of VCF alleles with read support, population frequency and consequence.

use std::io::{BufRead, Write};
use std::time::Instant;

use clap::Parser;
use thousands::Separable;

use crate::common::io::std::{open_read_maybe_gz, open_write_maybe_gz};
use crate::error::Error;

use self::client::{AnnotationClient, Fetch, HttpFetcher, ResponseScan};
use self::format::{FormatColumnIndex, FormatKeys};
use self::output::{AnnotationRow, AnnotationWriter};
use self::severity::SeverityVocabulary;
use self::vcf::VariantRecord;

pub mod client;
pub mod csq;
pub mod depth;
pub mod format;
pub mod output;
pub mod severity;
pub mod vcf;

/// Value written for any field that could not be determined.
pub const SENTINEL: &str = "-";

/// Default path of the severity vocabulary file.
pub const DEFAULT_SO_TERMS: &str = "SO_terms_sorted_by_ensembl_estimated_severity.txt";

/// Number of alleles between progress messages.
const PROGRESS_INTERVAL: usize = 100;

/// What to do with malformed VCF data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParseErrorPolicy {
    /// Log a warning and continue with the next line.
    #[default]
    Skip,
    /// Stop processing; rows written so far are kept.
    Abort,
}

/// Command line arguments for `annotate` sub command.
#[derive(Parser, Debug)]
#[command(about = "Annotate VCF alleles with depth, frequency and consequence", long_about = None)]
pub struct Args {
    /// Path to the input VCF file.
    #[arg(short = 'i', long)]
    pub path_input_vcf: String,
    /// Path to the output TSV file.
    #[arg(short = 'o', long)]
    pub path_output_tsv: String,
    /// Path to the TSV file with SO terms sorted by severity.
    #[arg(short = 's', long, default_value = DEFAULT_SO_TERMS)]
    pub path_so_terms: String,

    /// Base address of the variant information service.
    #[arg(long, default_value = client::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// How to handle malformed VCF data lines.
    #[arg(long, value_enum, default_value_t = ParseErrorPolicy::Skip)]
    pub on_parse_error: ParseErrorPolicy,

    /// For debug purposes, maximal number of records to annotate.
    #[arg(long)]
    pub max_var_count: Option<usize>,
}

/// Settings of the annotation loop.
#[derive(Debug, Clone, Default, derive_builder::Builder)]
#[builder(pattern = "immutable")]
pub struct Options {
    /// Names of the depth keys in the FORMAT column.
    #[builder(default)]
    pub format_keys: FormatKeys,
    /// Handling of malformed lines.
    #[builder(default)]
    pub on_parse_error: ParseErrorPolicy,
    /// Stop after this many records.
    #[builder(default)]
    pub max_var_count: Option<usize>,
}

impl From<&Args> for Options {
    fn from(args: &Args) -> Self {
        Self {
            format_keys: FormatKeys::default(),
            on_parse_error: args.on_parse_error,
            max_var_count: args.max_var_count,
        }
    }
}

/// Counters of one annotation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    /// Data records annotated.
    pub records: usize,
    /// Rows written, one per alternate allele.
    pub alleles: usize,
    /// Malformed lines skipped.
    pub skipped_lines: usize,
}

/// Annotate all data lines from `reader` and write the rows to `writer`.
///
/// The FORMAT column layout is taken from the first data record and assumed for all others;
/// deviating records are reported but decoded with the same column positions.
pub fn annotate<R, W, F, S>(
    reader: R,
    writer: W,
    vocabulary: &SeverityVocabulary,
    client: &AnnotationClient<F, S>,
    options: &Options,
) -> Result<Summary, anyhow::Error>
where
    R: BufRead,
    W: Write,
    F: Fetch,
    S: ResponseScan,
{
    tracing::info!("Annotating VCF ...");
    let start = Instant::now();

    let mut writer = AnnotationWriter::new(writer);
    writer.write_header()?;

    let mut summary = Summary::default();
    let mut column_index: Option<FormatColumnIndex> = None;
    let mut reader = reader;
    let mut buf = Vec::new();
    let mut line_no: usize = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        if buf.starts_with(b"#") || buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let parsed = std::str::from_utf8(&buf)
            .map_err(|e| Error::Parse(format!("line is not valid UTF-8: {}", e)))
            .and_then(str::parse::<VariantRecord>);
        let record = match parsed {
            Ok(record) => record,
            Err(e) => match options.on_parse_error {
                ParseErrorPolicy::Skip => {
                    tracing::warn!("Skipping malformed line {}: {}", line_no, e);
                    summary.skipped_lines += 1;
                    continue;
                }
                ParseErrorPolicy::Abort => {
                    writer.flush()?;
                    return Err(anyhow::Error::new(e).context(format!("line {}", line_no)));
                }
            },
        };

        let column_index = column_index.get_or_insert_with(|| {
            FormatColumnIndex::resolve(&record.format_keys, &options.format_keys)
        });
        if !column_index.matches_layout(&record.format_keys) {
            tracing::warn!(
                "FORMAT {:?} on line {} differs from the first record, decoding with the first record's layout",
                record.format_keys.join(":"),
                line_no
            );
        }
        if !record.variant_types_match_alternates() {
            tracing::warn!(
                "INFO TYPE lists {} types for {} alternate alleles on line {}",
                record.variant_types.len(),
                record.alternates.len(),
                line_no
            );
        }

        let depths = column_index.extract(&record.sample_values);
        for (allele_idx, var) in record.vcf_variants().enumerate() {
            let allele_frequency = client.frequency_lookup(&var);
            let consequence =
                csq::rank_consequence(&client.consequence_lookup(&var), vocabulary, client.scan());
            writer.write_row(&AnnotationRow::assemble(
                &record,
                allele_idx,
                &depths,
                allele_frequency,
                consequence,
            ))?;

            summary.alleles += 1;
            if summary.alleles == 1 || summary.alleles % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "variants processed: {}",
                    summary.alleles.separate_with_commas()
                );
            }
        }

        summary.records += 1;
        if let Some(max_var_count) = options.max_var_count {
            if summary.records >= max_var_count {
                tracing::warn!(
                    "Stopping after {} records as requested by --max-var-count",
                    summary.records
                );
                break;
            }
        }
    }
    writer.flush()?;

    if summary.skipped_lines > 0 {
        tracing::warn!("Skipped {} malformed lines", summary.skipped_lines);
    }
    tracing::info!(
        "... annotated {} alleles from {} records in {:?}",
        summary.alleles.separate_with_commas(),
        summary.records.separate_with_commas(),
        start.elapsed()
    );
    Ok(summary)
}

/// Main entry point for `annotate` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("VCF input file: {}", &args.path_input_vcf);
    tracing::info!("Annotated output file: {}", &args.path_output_tsv);
    tracing::info!("SO terms file: {}", &args.path_so_terms);
    tracing::info!("Malformed lines: {}", args.on_parse_error);

    let vocabulary = SeverityVocabulary::from_path(&args.path_so_terms)?;
    tracing::info!("SO terms read: {}", vocabulary.len());

    let config = client::ConfigBuilder::default()
        .base_url(args.base_url.clone())
        .build()?;
    let fetcher = HttpFetcher::new(&config)?;
    let client = AnnotationClient::new(config, fetcher);

    let reader = open_read_maybe_gz(&args.path_input_vcf)?;
    let writer = open_write_maybe_gz(&args.path_output_tsv)?;
    let summary = annotate(reader, writer, &vocabulary, &client, &Options::from(args))?;
    tracing::info!(
        "Read {} variants from {}",
        summary.alleles.separate_with_commas(),
        &args.path_input_vcf
    );

    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs::File;
    use std::io::BufReader;

    use clap_verbosity_flag::Verbosity;
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;
    use tracing_test::traced_test;

    use super::client::test::MockFetcher;
    use super::client::Config;
    use super::vcf::VcfVariant;
    use super::*;

    const INPUT_VCF: &str = "tests/data/annotate/input.vcf";
    const SO_TERMS: &str = "tests/data/annotate/so_terms.tsv";

    fn var(chromosome: &str, position: u64, reference: &str, alternative: &str) -> VcfVariant {
        VcfVariant {
            chromosome: chromosome.to_string(),
            position,
            reference: reference.to_string(),
            alternative: alternative.to_string(),
        }
    }

    /// Canned service responses for the variants in `INPUT_VCF`.
    ///
    /// `chr1-100-A-G` has no responses and thus fails on both endpoints.
    fn mock_fetcher() -> MockFetcher {
        let config = Config::default();
        let responses = [
            (
                var("chr1", 100, "A", "T"),
                r#"{"allele_count": 12, "allele_freq": 0.0012, "allele_num": 10000}"#,
                r#"[["missense_variant", "stop_gained"], ["intron_variant"]]"#,
            ),
            (
                var("chr2", 2000, "C", "CT"),
                r#"{"allele_count": 3, "allele_freq": 2.5e-05, "hom_count": 0}"#,
                r#"["intron_variant", "splice_region_variant"]"#,
            ),
            (
                var("chr3", 300, "G", "A"),
                r#"{"any_covered": false}"#,
                r#"["upstream_gene_variant"]"#,
            ),
            (
                var("chr17", 7577120, "C", "T"),
                r#"{"allele_freq": 0.5}"#,
                "[]",
            ),
        ];

        responses
            .iter()
            .fold(MockFetcher::default(), |fetcher, (var, freq, csqs)| {
                fetcher
                    .with_response(&config.variant_url(var), freq)
                    .with_response(&config.ordered_csqs_url(var), csqs)
            })
    }

    fn annotate_to_string(
        input: impl AsRef<[u8]>,
        fetcher: &MockFetcher,
        options: &Options,
    ) -> Result<(Summary, String), anyhow::Error> {
        let vocabulary = SeverityVocabulary::from_path(SO_TERMS)?;
        let client = AnnotationClient::new(Config::default(), fetcher);
        let mut buf = Vec::new();
        let summary = annotate(input.as_ref(), &mut buf, &vocabulary, &client, options)?;
        Ok((summary, String::from_utf8(buf)?))
    }

    #[test]
    fn annotate_with_mock_service() -> Result<(), anyhow::Error> {
        let fetcher = mock_fetcher();
        let input = std::fs::read_to_string(INPUT_VCF)?;

        let (summary, actual) = annotate_to_string(&input, &fetcher, &Options::default())?;

        let expected = std::fs::read_to_string("tests/data/annotate/output.tsv")?;
        assert_eq!(&expected, &actual);
        assert_eq!(
            summary,
            Summary {
                records: 4,
                alleles: 5,
                skipped_lines: 1,
            }
        );
        // Two lookups per allele, in input order.
        let requests = fetcher.requests.borrow();
        assert_eq!(requests.len(), 10);
        assert_eq!(
            requests[0],
            "http://exac.hms.harvard.edu/rest/variant/variant/chr1-100-A-T"
        );
        assert_eq!(
            requests[1],
            "http://exac.hms.harvard.edu/rest/variant/ordered_csqs/chr1-100-A-T"
        );

        Ok(())
    }

    #[test]
    fn annotate_is_idempotent() -> Result<(), anyhow::Error> {
        let input = std::fs::read_to_string(INPUT_VCF)?;

        let (_, first) = annotate_to_string(&input, &mock_fetcher(), &Options::default())?;
        let (_, second) = annotate_to_string(&input, &mock_fetcher(), &Options::default())?;

        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn one_row_per_alternate_allele() -> Result<(), anyhow::Error> {
        let input = "##fileformat=VCFv4.2\n\
                     1\t10\t.\tA\tC,G,T\t.\t.\tTYPE=snp,snp,snp\tDP:DPR:RO\t.\t9:3,2,2,2:3\n\
                     1\t20\t.\tA\tC\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n";

        let (summary, actual) =
            annotate_to_string(input, &MockFetcher::default(), &Options::default())?;

        assert_eq!(summary.alleles, 4);
        let alts = actual
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(3).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(alts, vec!["C", "G", "T", "C"]);

        Ok(())
    }

    #[test]
    fn abort_on_parse_error() -> Result<(), anyhow::Error> {
        let input = "1\t10\t.\tA\tC\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n\
                     1\tNaN\t.\tA\tC\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n\
                     1\t30\t.\tA\tC\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n";
        let options = OptionsBuilder::default()
            .on_parse_error(ParseErrorPolicy::Abort)
            .build()?;

        let res = annotate_to_string(input, &MockFetcher::default(), &options);

        let err = res.expect_err("must abort");
        assert_eq!(err.to_string(), "line 2");
        assert!(matches!(
            err.downcast_ref::<crate::error::Error>(),
            Some(crate::error::Error::Parse(_))
        ));

        Ok(())
    }

    const NON_UTF8_INPUT: &[u8] = b"1\t10\t.\tA\tC\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n\
        1\t20\t.\tA\tC\t.\t.\tTYPE=snp;NOTE=\xff\tDP:DPR:RO\t.\t9:3,6:3\n\
        1\t30\t.\tA\tG\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n";

    #[traced_test]
    #[test]
    fn skip_non_utf8_line() -> Result<(), anyhow::Error> {
        let (summary, actual) =
            annotate_to_string(NON_UTF8_INPUT, &MockFetcher::default(), &Options::default())?;

        assert!(logs_contain("Skipping malformed line 2"));
        assert_eq!(
            summary,
            Summary {
                records: 2,
                alleles: 2,
                skipped_lines: 1,
            }
        );
        let positions = actual
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(1).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(positions, vec!["10", "30"]);

        Ok(())
    }

    #[test]
    fn abort_on_non_utf8_line() -> Result<(), anyhow::Error> {
        let options = OptionsBuilder::default()
            .on_parse_error(ParseErrorPolicy::Abort)
            .build()?;

        let err = annotate_to_string(NON_UTF8_INPUT, &MockFetcher::default(), &options)
            .expect_err("must abort");

        assert_eq!(err.to_string(), "line 2");
        assert!(matches!(
            err.downcast_ref::<crate::error::Error>(),
            Some(crate::error::Error::Parse(_))
        ));

        Ok(())
    }

    #[test]
    fn max_var_count() -> Result<(), anyhow::Error> {
        let input = std::fs::read_to_string(INPUT_VCF)?;
        let options = OptionsBuilder::default().max_var_count(Some(1)).build()?;

        let (summary, actual) = annotate_to_string(&input, &mock_fetcher(), &options)?;

        assert_eq!(summary.records, 1);
        assert_eq!(actual.lines().count(), 3);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn warns_on_format_mismatch() -> Result<(), anyhow::Error> {
        let input = "1\t10\t.\tA\tC\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6:3\n\
                     1\t20\t.\tA\tC\t.\t.\tTYPE=snp\tRO:DP:DPR\t.\t3:9:3,6\n";

        let (_, actual) = annotate_to_string(input, &MockFetcher::default(), &Options::default())?;

        assert!(logs_contain("differs from the first record"));
        // The second record is decoded with the first record's layout.
        let depths = actual
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(4).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(depths, vec!["9", "3"]);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn warns_on_type_count_mismatch() -> Result<(), anyhow::Error> {
        let input = "1\t10\t.\tA\tC,G\t.\t.\tTYPE=snp\tDP:DPR:RO\t.\t9:3,6,0:3\n";

        let (_, actual) = annotate_to_string(input, &MockFetcher::default(), &Options::default())?;

        assert!(logs_contain("INFO TYPE lists 1 types for 2 alternate alleles"));
        let types = actual
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(8).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(types, vec!["snp", "-"]);

        Ok(())
    }

    #[rstest::rstest]
    #[case("input.vcf")]
    #[case("input.vcf.gz")]
    fn smoke_test_unreachable_service(#[case] input: &str) -> Result<(), anyhow::Error> {
        let temp = TempDir::default();
        let path_out = temp.join("output.tsv");

        let args_common = crate::common::Args {
            verbose: Verbosity::new(0, 0),
        };
        let args = Args {
            path_input_vcf: format!("tests/data/annotate/{}", input),
            path_output_tsv: path_out.to_string_lossy().to_string(),
            path_so_terms: String::from(SO_TERMS),
            // Nothing listens on the discard port, every lookup fails.
            base_url: String::from("http://127.0.0.1:9"),
            on_parse_error: ParseErrorPolicy::Skip,
            max_var_count: None,
        };

        run(&args_common, &args)?;

        let actual = std::fs::read_to_string(&args.path_output_tsv)?;
        let expected = std::fs::read_to_string("tests/data/annotate/output-unreachable.tsv")?;
        assert_eq!(&expected, &actual);

        Ok(())
    }

    #[test]
    fn run_fails_without_vocabulary() {
        let temp = TempDir::default();
        let path_out = temp.join("output.tsv");
        let args = Args {
            path_input_vcf: String::from(INPUT_VCF),
            path_output_tsv: path_out.to_string_lossy().to_string(),
            path_so_terms: String::from("tests/data/annotate/missing.tsv"),
            base_url: String::from("http://127.0.0.1:9"),
            on_parse_error: ParseErrorPolicy::Skip,
            max_var_count: None,
        };

        let res = run(&crate::common::Args::default(), &args);

        assert!(res.is_err());
        assert!(!path_out.exists());
    }

    #[test]
    fn input_lines_are_read_in_order() -> Result<(), anyhow::Error> {
        let reader = BufReader::new(File::open(INPUT_VCF)?);
        let records = reader
            .lines()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.parse::<VariantRecord>().ok())
            .map(|record| record.chromosome)
            .collect::<Vec<_>>();

        assert_eq!(records, vec!["chr1", "chr2", "chr3", "chr17"]);

        Ok(())
    }
}

//! Client for the remote variant information service.
//!
//! Two endpoints are queried per allele: the variant endpoint for the population allele
//! frequency and the ordered consequences endpoint for the list of consequence terms.  Responses
//! are treated as opaque text and scanned by a `ResponseScan` implementation, so a structured
//! parser can replace the substring heuristics without touching ranking or output.

use crate::error::TransportError;

use super::severity::SeverityTerm;
use super::vcf::VcfVariant;
use super::SENTINEL;

/// Default base address of the service.
pub const DEFAULT_BASE_URL: &str = "http://exac.hms.harvard.edu";
/// Default path of the variant information endpoint.
pub const DEFAULT_VARIANT_PATH: &str = "/rest/variant/variant/";
/// Default path of the ordered consequences endpoint.
pub const DEFAULT_ORDERED_CSQS_PATH: &str = "/rest/variant/ordered_csqs/";

/// Marker preceding the allele frequency in variant responses.
const ALLELE_FREQ_MARKER: &str = "allele_freq";

/// Configuration of the remote service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder)]
#[builder(pattern = "immutable", default)]
pub struct Config {
    /// Base address, e.g., `http://exac.hms.harvard.edu`.
    pub base_url: String,
    /// Path of the variant endpoint below `base_url`.
    pub variant_path: String,
    /// Path of the ordered consequences endpoint below `base_url`.
    pub ordered_csqs_path: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            variant_path: String::from(DEFAULT_VARIANT_PATH),
            ordered_csqs_path: String::from(DEFAULT_ORDERED_CSQS_PATH),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), crate::common::version()),
        }
    }
}

impl Config {
    fn url(&self, path: &str, var: &VcfVariant) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_matches('/'),
            var
        )
    }

    /// URL of the variant endpoint for `var`.
    pub fn variant_url(&self, var: &VcfVariant) -> String {
        self.url(&self.variant_path, var)
    }

    /// URL of the ordered consequences endpoint for `var`.
    pub fn ordered_csqs_url(&self, var: &VcfVariant) -> String {
        self.url(&self.ordered_csqs_path, var)
    }
}

/// Transport for retrieving the response text of a URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String, TransportError>;
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, TransportError> {
        let request_error = |e: reqwest::Error| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(request_error)
    }
}

/// Extraction of the fields of interest from response text.
pub trait ResponseScan {
    /// The allele frequency in a variant endpoint response, if present.
    fn allele_frequency(&self, body: &str) -> Option<String>;

    /// Whether a consequences endpoint response lists `term`.
    fn mentions_term(&self, body: &str, term: &SeverityTerm) -> bool;
}

/// Substring based scanning of JSON-like response text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextScan;

impl ResponseScan for TextScan {
    /// Take the comma-delimited token following the `allele_freq` key.
    ///
    /// Only whole keys followed by a colon count, so `allele_freq_popmax` and the like are
    /// passed over.
    fn allele_frequency(&self, body: &str) -> Option<String> {
        let is_key_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
        let rest = body
            .match_indices(ALLELE_FREQ_MARKER)
            .find_map(|(idx, marker)| {
                if body[..idx].chars().next_back().is_some_and(is_key_char) {
                    return None;
                }
                body[idx + marker.len()..]
                    .trim_start_matches('"')
                    .trim_start()
                    .strip_prefix(':')
            })?;
        let token = rest
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(['}', ']'])
            .trim()
            .trim_matches('"');
        if token.is_empty() || token == "null" {
            None
        } else {
            Some(token.to_string())
        }
    }

    fn mentions_term(&self, body: &str, term: &SeverityTerm) -> bool {
        body.contains(term.quoted())
    }
}

/// Client performing the lookups for one allele at a time.
///
/// Every call issues a new request; there is no caching and no retry.
#[derive(Debug, Clone)]
pub struct AnnotationClient<F, S = TextScan> {
    config: Config,
    fetcher: F,
    scan: S,
}

impl<F: Fetch> AnnotationClient<F, TextScan> {
    pub fn new(config: Config, fetcher: F) -> Self {
        Self::with_scan(config, fetcher, TextScan)
    }
}

impl<F: Fetch, S: ResponseScan> AnnotationClient<F, S> {
    pub fn with_scan(config: Config, fetcher: F, scan: S) -> Self {
        Self {
            config,
            fetcher,
            scan,
        }
    }

    pub fn scan(&self) -> &S {
        &self.scan
    }

    fn fetch(&self, url: &str) -> Result<String, TransportError> {
        tracing::debug!("GET {}", url);
        self.fetcher.fetch(url).map_err(|e| {
            tracing::warn!("lookup failed, using {:?} instead: {}", SENTINEL, e);
            e
        })
    }

    /// Population allele frequency of `var`, or the sentinel if unavailable.
    pub fn frequency_lookup(&self, var: &VcfVariant) -> String {
        self.fetch(&self.config.variant_url(var))
            .ok()
            .and_then(|body| self.scan.allele_frequency(&body))
            .unwrap_or_else(|| String::from(SENTINEL))
    }

    /// Raw ordered consequences response for `var`.
    pub fn consequence_lookup(&self, var: &VcfVariant) -> Result<String, TransportError> {
        self.fetch(&self.config.ordered_csqs_url(var))
    }
}

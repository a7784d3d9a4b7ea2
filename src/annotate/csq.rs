//! Selection of the most severe consequence of an allele.

use crate::error::TransportError;

use super::client::ResponseScan;
use super::severity::{SeverityTerm, SeverityVocabulary};
use super::SENTINEL;

/// Most severe vocabulary term listed in `response` together with its rank.
///
/// Terms are tried in severity order and the first one found wins, so the result does not
/// depend on the order of terms within the response.
pub fn most_severe<'a, S: ResponseScan>(
    response: &str,
    vocabulary: &'a SeverityVocabulary,
    scan: &S,
) -> Option<(usize, &'a SeverityTerm)> {
    vocabulary
        .iter()
        .enumerate()
        .find(|(_, term)| scan.mentions_term(response, term))
}

/// Consequence column value for the result of a consequences lookup.
pub fn rank_consequence<S: ResponseScan>(
    response: &Result<String, TransportError>,
    vocabulary: &SeverityVocabulary,
    scan: &S,
) -> String {
    match response {
        Ok(response) => most_severe(response, vocabulary, scan)
            .map(|(_, term)| term.term().to_string())
            .unwrap_or_else(|| String::from(SENTINEL)),
        Err(_) => String::from(SENTINEL),
    }
}

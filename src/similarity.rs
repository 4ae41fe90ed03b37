// 🔎 Name-Similarity Auditor - Flag identities that are probably one person
//
// Participants are keyed by normalized name only, so a typo ("merlin" vs
// "beslarin") splits one person into two ledger rows. This pass scores every
// pair with Jaro-Winkler and reports the close ones for manual review.
// Advisory only: it never merges registry entries.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SettlementConfig;
use crate::entities::{ParticipantId, ParticipantRegistry};

const PREFIX_LIMIT: usize = 4;
const PREFIX_SCALE: f64 = 0.1;

// ============================================================================
// JARO-WINKLER
// ============================================================================

/// Jaro-Winkler similarity in [0.0, 1.0], compared per char
pub fn jaro_winkler(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let jaro = jaro(&a, &b);
    if jaro == 0.0 {
        return 0.0;
    }

    let prefix = a
        .iter()
        .zip(b.iter())
        .take(PREFIX_LIMIT)
        .take_while(|(x, y)| x == y)
        .count();

    jaro + prefix as f64 * PREFIX_SCALE * (1.0 - jaro)
}

fn jaro(a: &[char], b: &[char]) -> f64 {
    let window = (a.len().max(b.len()) / 2) as isize - 1;

    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ch) in a.iter().enumerate() {
        let start = (i as isize - window).max(0) as usize;
        let end = (i as isize + window + 1).clamp(0, b.len() as isize) as usize;

        for j in start..end {
            if b_matched[j] || b[j] != *ch {
                continue;
            }
            a_matched[i] = true;
            b_matched[j] = true;
            matches += 1;
            break;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    // Matched characters of both strings, in order; mismatching positions
    // are the transpositions
    let a_seq = a.iter().zip(&a_matched).filter(|(_, m)| **m).map(|(c, _)| c);
    let b_seq = b.iter().zip(&b_matched).filter(|(_, m)| **m).map(|(c, _)| c);
    let transpositions = a_seq.zip(b_seq).filter(|(x, y)| x != y).count();

    let m = matches as f64;
    let t = transpositions as f64 / 2.0;
    (m / a.len() as f64 + m / b.len() as f64 + (m - t) / m) / 3.0
}

// ============================================================================
// AUDITOR
// ============================================================================

/// Two identities that look like the same person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarNamePair {
    pub first: ParticipantId,
    pub second: ParticipantId,
    pub score: f64,
}

pub struct NameSimilarityAuditor {
    threshold: f64,
}

impl NameSimilarityAuditor {
    pub fn new() -> Self {
        Self::with_config(&SettlementConfig::default())
    }

    pub fn with_config(config: &SettlementConfig) -> Self {
        NameSimilarityAuditor {
            threshold: config.similarity_threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score every pair, keep those at or above the threshold, best first
    pub fn audit<'a, I>(&self, identities: I) -> Vec<SimilarNamePair>
    where
        I: IntoIterator<Item = &'a ParticipantId>,
    {
        let identities: Vec<&ParticipantId> = identities.into_iter().collect();
        let mut pairs = Vec::new();

        for i in 0..identities.len() {
            for j in (i + 1)..identities.len() {
                let (first, second) = (identities[i], identities[j]);
                if first == second {
                    continue;
                }
                let score = jaro_winkler(first.as_str(), second.as_str());
                if score >= self.threshold {
                    pairs.push(SimilarNamePair {
                        first: first.clone(),
                        second: second.clone(),
                        score,
                    });
                }
            }
        }

        pairs.sort_by(|a, b| b.score.total_cmp(&a.score));

        for pair in &pairs {
            warn!(
                first = %pair.first,
                second = %pair.second,
                score = pair.score,
                "similar participant names"
            );
        }
        pairs
    }

    pub fn audit_registry(&self, registry: &ParticipantRegistry) -> Vec<SimilarNamePair> {
        self.audit(registry.ids())
    }
}

impl Default for NameSimilarityAuditor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

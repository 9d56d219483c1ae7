//! Dictionary-based skill matching plus dictionary validation and evaluation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use jme_core::{Skill, SkillDictionaryEntry};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Confidence assigned to every dictionary hit.
pub const DICT_CONFIDENCE: f64 = 0.9;
/// Provenance tag stored on JobSkill rows.
pub const DICT_PROVENANCE: &str = "dict_v1";

/// Lowercase, trim, normalize hyphen spacing, collapse whitespace.
pub fn normalize_skill_term(term: &str) -> String {
    let lower = term.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut chars = lower.chars().peekable();
    let mut pending_space = false;
    while let Some(ch) = chars.next() {
        if ch == '-' {
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('-');
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            pending_space = false;
        } else if ch.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    out
}

fn is_token_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '+' | '#' | '.' | '_')
}

/// Case-folded word tokens; hyphens, slashes and other punctuation separate tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_token_char(c))
        .map(|t| t.trim_end_matches(&['.', '_'][..]))
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn phrase_key(term: &str) -> String {
    tokenize(&normalize_skill_term(term)).join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasCollision {
    pub alias: String,
    pub kept: String,
    pub rejected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub name: String,
    pub confidence: f64,
}

/// Alias→canonical phrase index, rebuilt from the Skill set at the start of each run.
#[derive(Debug, Clone, Default)]
pub struct SkillMatcher {
    phrases: HashMap<String, String>,
    max_phrase_tokens: usize,
    collisions: Vec<AliasCollision>,
}

impl SkillMatcher {
    pub fn build<'a, I, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, A)>,
        A: IntoIterator<Item = &'a String>,
    {
        let mut matcher = Self::default();
        for (canonical, aliases) in entries {
            let canonical = normalize_skill_term(canonical);
            if canonical.is_empty() {
                continue;
            }
            matcher.register(&canonical, &canonical);
            for alias in aliases {
                matcher.register(alias, &canonical);
            }
        }
        matcher
    }

    pub fn from_skills(skills: &[Skill]) -> Self {
        Self::build(
            skills
                .iter()
                .map(|s| (s.name_canonical.as_str(), s.aliases.iter())),
        )
    }

    pub fn from_dictionary(entries: &[SkillDictionaryEntry]) -> Self {
        Self::build(
            entries
                .iter()
                .map(|e| (e.name_canonical.as_str(), e.aliases.iter())),
        )
    }

    fn register(&mut self, surface: &str, canonical: &str) {
        let key = phrase_key(surface);
        if key.is_empty() {
            return;
        }
        match self.phrases.get(&key) {
            Some(existing) if existing != canonical => {
                warn!(
                    alias = %key,
                    kept = %existing,
                    rejected = %canonical,
                    "skill alias maps to two canonical skills; first registration wins"
                );
                self.collisions.push(AliasCollision {
                    alias: key,
                    kept: existing.clone(),
                    rejected: canonical.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.max_phrase_tokens = self.max_phrase_tokens.max(key.split(' ').count());
                self.phrases.insert(key, canonical.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    pub fn collisions(&self) -> &[AliasCollision] {
        &self.collisions
    }

    pub fn canonical_for(&self, surface: &str) -> Option<&str> {
        self.phrases.get(&phrase_key(surface)).map(String::as_str)
    }

    /// Longest non-overlapping phrase matches, one entry per canonical skill,
    /// sorted by descending confidence then name.
    pub fn extract(&self, text: &str) -> Vec<SkillMatch> {
        if self.is_empty() || text.trim().is_empty() {
            return Vec::new();
        }
        let tokens = tokenize(text);
        let mut found: BTreeMap<&str, f64> = BTreeMap::new();

        let mut i = 0;
        while i < tokens.len() {
            let longest = self.max_phrase_tokens.min(tokens.len() - i);
            let hit = (1..=longest).rev().find_map(|len| {
                let key = tokens[i..i + len].join(" ");
                self.phrases.get(&key).map(|canonical| (len, canonical))
            });
            match hit {
                Some((len, canonical)) => {
                    let conf = found.entry(canonical.as_str()).or_insert(0.0);
                    *conf = conf.max(DICT_CONFIDENCE);
                    i += len;
                }
                None => i += 1,
            }
        }

        let mut matches = found
            .into_iter()
            .map(|(name, confidence)| SkillMatch {
                name: name.to_string(),
                confidence,
            })
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.name.cmp(&b.name))
        });
        matches
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DictionaryIssue {
    DuplicateCanonical {
        name: String,
    },
    AliasConflict {
        alias: String,
        first: String,
        second: String,
    },
}

impl fmt::Display for DictionaryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryIssue::DuplicateCanonical { name } => {
                write!(f, "duplicate canonical: {name}")
            }
            DictionaryIssue::AliasConflict {
                alias,
                first,
                second,
            } => write!(f, "alias mapped to multiple canon: {alias} -> {first} / {second}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryReport {
    pub skills: usize,
    /// Distinct match phrases (canonical names and aliases after tokenization).
    pub phrases: usize,
    pub issues: Vec<DictionaryIssue>,
}

impl DictionaryReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Unique canonical names, and no match phrase shared by two canonical names.
///
/// Surfaces are compared by the same phrase key the matcher indexes, and a
/// canonical name counts as a surface of its own skill, so every conflict the
/// matcher would resolve by first registration is reported here.
pub fn validate_dictionary(entries: &[SkillDictionaryEntry]) -> DictionaryReport {
    let mut seen = BTreeSet::new();
    let mut phrase_owner: BTreeMap<String, String> = BTreeMap::new();
    let mut issues = Vec::new();

    for entry in entries {
        let canonical = normalize_skill_term(&entry.name_canonical);
        if !seen.insert(canonical.clone()) {
            issues.push(DictionaryIssue::DuplicateCanonical {
                name: canonical.clone(),
            });
        }
        let surfaces = std::iter::once(&entry.name_canonical).chain(&entry.aliases);
        for surface in surfaces {
            let key = phrase_key(surface);
            if key.is_empty() {
                continue;
            }
            match phrase_owner.get(&key) {
                Some(owner) if *owner != canonical => {
                    issues.push(DictionaryIssue::AliasConflict {
                        alias: key,
                        first: owner.clone(),
                        second: canonical.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    phrase_owner.insert(key, canonical.clone());
                }
            }
        }
    }

    DictionaryReport {
        skills: entries.len(),
        phrases: phrase_owner.len(),
        issues,
    }
}

/// Entry with its canonical name and aliases normalized, ready to persist.
pub fn normalized_entry(entry: &SkillDictionaryEntry) -> SkillDictionaryEntry {
    let canonical = normalize_skill_term(&entry.name_canonical);
    let mut aliases = Vec::new();
    for alias in &entry.aliases {
        let alias = normalize_skill_term(alias);
        if !alias.is_empty() && alias != canonical && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }
    SkillDictionaryEntry {
        name_canonical: canonical,
        category: entry
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string),
        aliases,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvalSample {
    pub text: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EvalReport {
    pub samples: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvalReport {
    pub fn precision(&self) -> f64 {
        let predicted = self.true_positives + self.false_positives;
        if predicted == 0 {
            0.0
        } else {
            self.true_positives as f64 / predicted as f64
        }
    }

    pub fn recall(&self) -> f64 {
        let gold = self.true_positives + self.false_negatives;
        if gold == 0 {
            0.0
        } else {
            self.true_positives as f64 / gold as f64
        }
    }
}

/// Micro-averaged precision/recall of the matcher over labelled samples.
pub fn evaluate(matcher: &SkillMatcher, samples: &[EvalSample]) -> EvalReport {
    let mut report = EvalReport {
        samples: samples.len(),
        ..EvalReport::default()
    };
    for sample in samples {
        let predicted = matcher
            .extract(&sample.text)
            .into_iter()
            .map(|m| m.name)
            .collect::<BTreeSet<_>>();
        let gold = sample
            .labels
            .iter()
            .map(|l| normalize_skill_term(l))
            .collect::<BTreeSet<_>>();
        report.true_positives += predicted.intersection(&gold).count();
        report.false_positives += predicted.difference(&gold).count();
        report.false_negatives += gold.difference(&predicted).count();
    }
    report
}

/// Parse a JSONL file body of `{text, labels}` lines; blank lines are ignored.
pub fn parse_eval_samples(body: &str) -> Result<Vec<EvalSample>, serde_json::Error> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<EvalSample>)
        .collect()
}

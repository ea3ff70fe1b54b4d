//! Query parsing: keywords, intent, query-derived filters, synonym expansion.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::memory::types::{BlockType, Scope};
use crate::tagger::AutoTagger;

/// Synonyms appended per recognized term.
pub const MAX_EXPANSIONS_PER_TERM: usize = 2;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "is", "are", "was", "were", "be", "been", "to", "of",
    "in", "on", "at", "for", "with", "by", "from", "about", "as", "into", "it", "its", "this",
    "that", "these", "those", "i", "me", "my", "we", "our", "you", "your", "do", "does", "did",
    "what", "which", "who", "how", "when", "where", "find", "show", "get", "list", "search",
    "any", "all", "some", "there", "have", "has", "had", "can", "should", "would", "could",
];

const EXPANSIONS: &[(&str, &[&str])] = &[
    ("auth", &["authentication", "authorization"]),
    ("authn", &["authentication"]),
    ("authz", &["authorization", "permissions"]),
    ("db", &["database", "sql"]),
    ("config", &["configuration", "settings"]),
    ("cfg", &["configuration"]),
    ("api", &["endpoint", "interface"]),
    ("ui", &["interface", "frontend"]),
    ("ux", &["user experience"]),
    ("ts", &["typescript"]),
    ("js", &["javascript"]),
    ("py", &["python"]),
    ("repo", &["repository"]),
    ("deps", &["dependencies", "packages"]),
    ("env", &["environment"]),
    ("perf", &["performance", "optimization"]),
    ("docs", &["documentation"]),
    ("impl", &["implementation"]),
    ("fn", &["function"]),
    ("err", &["error"]),
    ("msg", &["message"]),
    ("k8s", &["kubernetes"]),
    ("ci", &["pipeline", "continuous integration"]),
    ("arch", &["architecture"]),
    ("prefs", &["preferences"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    FindCorrection,
    FindDecision,
    FindPreference,
    FindPattern,
    FindTechnology,
    FindPersona,
    General,
}

impl QueryIntent {
    /// Block types the intent usually targets.
    pub fn suggested_types(&self) -> &'static [BlockType] {
        match self {
            Self::FindCorrection | Self::FindDecision => &[BlockType::Corrections],
            Self::FindPreference => &[BlockType::User],
            Self::FindPattern | Self::FindTechnology => &[BlockType::Project],
            Self::FindPersona => &[BlockType::Persona],
            Self::General => &[],
        }
    }
}

/// First matching rule wins.
static INTENT_RULES: LazyLock<Vec<(Regex, QueryIntent)>> = LazyLock::new(|| {
    [
        (r"\b(mistakes?|wrong|corrections?|corrected|don'?t do)\b", QueryIntent::FindCorrection),
        (r"\b(why|decided|decisions?|chose|choices?|rationale)\b", QueryIntent::FindDecision),
        (r"\b(prefers?|preferences?|likes?|favou?rite|style)\b", QueryIntent::FindPreference),
        (r"\b(patterns?|architecture|structure|conventions?)\b", QueryIntent::FindPattern),
        (r"\b(stack|frameworks?|libraries|library|languages?|tooling)\b", QueryIntent::FindTechnology),
        (r"\b(persona|personality|traits?|who am i|expertise)\b", QueryIntent::FindPersona),
    ]
    .into_iter()
    .filter_map(|(pattern, intent)| match Regex::new(pattern) {
        Ok(re) => Some((re, intent)),
        Err(e) => {
            tracing::error!(pattern, error = %e, "invalid intent pattern");
            None
        }
    })
    .collect()
});

static SCOPE_MENTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(global|project)\s+(scope|memory|memories)\b").ok());

static TYPE_MENTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(persona|project|user|corrections?)\s+(blocks?|memory|memories)\b").ok()
});

/// Structured reading of a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuery {
    pub original: String,
    /// Lowercased and trimmed.
    pub normalized: String,
    pub keywords: Vec<String>,
    pub intent: QueryIntent,
    /// Explicitly mentioned ("global scope"); applied as a filter.
    pub scope: Option<Scope>,
    /// Explicitly mentioned ("persona block"); applied as a filter.
    pub types: Vec<BlockType>,
    /// Intent-suggested types; these only boost relevance.
    pub suggested_types: Vec<BlockType>,
    /// Category tags mined from the query; these only boost relevance.
    pub tags: Vec<String>,
}

pub fn parse_query(text: &str, tagger: &AutoTagger) -> ParsedQuery {
    let normalized = text.trim().to_lowercase();

    let keywords = tokenize(&normalized)
        .filter(|t| !STOP_WORDS.contains(t))
        .fold(Vec::<String>::new(), |mut acc, t| {
            if !acc.iter().any(|k| k == t) {
                acc.push(t.to_string());
            }
            acc
        });

    let intent = INTENT_RULES
        .iter()
        .find(|(re, _)| re.is_match(&normalized))
        .map(|(_, intent)| *intent)
        .unwrap_or(QueryIntent::General);

    let scope = SCOPE_MENTION
        .as_ref()
        .and_then(|re| re.captures(&normalized))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let mut types = Vec::new();
    if let Some(re) = TYPE_MENTION.as_ref() {
        for caps in re.captures_iter(&normalized) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let name = if name == "correction" { "corrections" } else { name };
            if let Ok(t) = name.parse::<BlockType>() {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
        }
    }

    ParsedQuery {
        original: text.to_string(),
        keywords,
        intent,
        scope,
        types,
        suggested_types: intent.suggested_types().to_vec(),
        tags: tagger.suggest_tags(&normalized),
        normalized,
    }
}

/// A search term, tied back to the keyword it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedTerm {
    pub term: String,
    /// Index into [`ParsedQuery::keywords`].
    pub source: usize,
    /// False for synonyms added by expansion.
    pub direct: bool,
}

/// Keywords followed by up to [`MAX_EXPANSIONS_PER_TERM`] synonyms each.
pub fn expand_terms(keywords: &[String], expand: bool) -> Vec<ExpandedTerm> {
    let mut out: Vec<ExpandedTerm> = keywords
        .iter()
        .enumerate()
        .map(|(source, k)| ExpandedTerm {
            term: k.clone(),
            source,
            direct: true,
        })
        .collect();
    if !expand {
        return out;
    }

    for (source, keyword) in keywords.iter().enumerate() {
        let Some((_, synonyms)) = EXPANSIONS.iter().find(|(abbr, _)| *abbr == keyword) else {
            continue;
        };
        for synonym in synonyms.iter().take(MAX_EXPANSIONS_PER_TERM) {
            if !out.iter().any(|t| t.term == *synonym) {
                out.push(ExpandedTerm {
                    term: synonym.to_string(),
                    source,
                    direct: false,
                });
            }
        }
    }
    out
}

/// Query text used for the embedding: keywords plus synonyms.
pub fn embedding_text(terms: &[ExpandedTerm]) -> String {
    terms
        .iter()
        .map(|t| t.term.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '\''))
        .map(|t| t.trim_matches(|c| c == '-' || c == '\''))
        .filter(|t| t.chars().count() >= 2)
}

//! Dependency declaration parsing.
//!
//! Handles the subset of PEP 508 that shows up in `pyproject.toml` and
//! `requirements.txt`: a name, optional extras, an optional clause list
//! (`>=1.0,<2.0`) or a direct URL (`pkg @ https://...`), and an optional
//! environment marker after `;`.
//!
//! [`Specifier::parse`] never fails. Input it cannot make sense of becomes a
//! specifier whose name is the whole declaration and which has no clauses.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*)$")
        .expect("name pattern is valid")
});

static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(===|==|!=|~=|<=|>=|<|>)\s*([A-Za-z0-9_.*+!-]+)$")
        .expect("clause pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "===")]
    ArbitraryEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "~=")]
    Compatible,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
}

impl Operator {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "===" => Operator::ArbitraryEqual,
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "~=" => Operator::Compatible,
            "<=" => Operator::LessEqual,
            ">=" => Operator::GreaterEqual,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::ArbitraryEqual => "===",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Compatible => "~=",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::Greater => ">",
        }
    }

    /// True for operators that pin a single exact version.
    pub fn is_exact(&self) -> bool {
        matches!(self, Operator::Equal | Operator::ArbitraryEqual)
    }
}

/// One `<operator><version>` clause of a specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub operator: Operator,
    pub version: String,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.as_str(), self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Specifier {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clauses: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl Specifier {
    /// Parses a raw declaration, falling back to a bare name on failure.
    pub fn parse(declaration: &str) -> Self {
        match Self::try_parse(declaration) {
            Some(spec) => spec,
            None => {
                tracing::debug!(declaration, "unparseable dependency declaration, using it as a name");
                Self::bare(declaration.trim())
            }
        }
    }

    /// Strict parse. Returns `None` when the declaration is not well formed.
    pub fn try_parse(declaration: &str) -> Option<Self> {
        let declaration = declaration.trim();
        let caps = NAME_RE.captures(declaration)?;

        let name = caps[1].to_string();
        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let rest = caps.get(3).map_or("", |m| m.as_str()).trim();

        if let Some(url_part) = rest.strip_prefix('@') {
            // URLs may contain ';', so the marker must be separated by whitespace.
            let url_part = url_part.trim();
            let (url, marker) = match url_part.find(" ;").or_else(|| url_part.find("\t;")) {
                Some(idx) => (&url_part[..idx], Some(&url_part[idx + 2..])),
                None => (url_part, None),
            };
            let url = url.trim();
            if url.is_empty() || url.contains(char::is_whitespace) {
                return None;
            }
            return Some(Self {
                name,
                extras,
                clauses: Vec::new(),
                url: Some(url.to_string()),
                marker: normalize_marker(marker),
            });
        }

        let (versions, marker) = match rest.split_once(';') {
            Some((versions, marker)) => (versions.trim(), Some(marker)),
            None => (rest, None),
        };

        let versions = match versions.strip_prefix('(') {
            Some(inner) => inner.strip_suffix(')')?.trim(),
            None => versions,
        };

        let clauses = if versions.is_empty() {
            Vec::new()
        } else {
            versions
                .split(',')
                .map(|clause| {
                    let caps = CLAUSE_RE.captures(clause.trim())?;
                    Some(Clause {
                        operator: Operator::parse(&caps[1])?,
                        version: caps[2].to_string(),
                    })
                })
                .collect::<Option<Vec<_>>>()?
        };

        Some(Self {
            name,
            extras,
            clauses,
            url: None,
            marker: normalize_marker(marker),
        })
    }

    fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extras: Vec::new(),
            clauses: Vec::new(),
            url: None,
            marker: None,
        }
    }

    /// The first clause, used as the declared baseline.
    pub fn constraint(&self) -> Option<&Clause> {
        self.clauses.first()
    }

    pub fn is_url(&self) -> bool {
        self.url.is_some()
    }

    /// True when some clause pins an exact version.
    pub fn is_pinned(&self) -> bool {
        self.clauses.iter().any(|c| c.operator.is_exact())
    }

    /// The clause list as written, e.g. `>=1.0,<2.0`.
    pub fn clauses_string(&self) -> String {
        self.clauses
            .iter()
            .map(Clause::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Rewrites this dependency as an exact pin.
    pub fn pinned(&self, version: &str) -> String {
        format!("{}=={}", self.name, version)
    }
}

fn normalize_marker(marker: Option<&str>) -> Option<String> {
    marker
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// PEP 503 normalized project name: lowercase, runs of `-_.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

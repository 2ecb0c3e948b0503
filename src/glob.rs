//! Shell-style glob patterns evaluated against an [`IsoTree`].
//!
//! Supported syntax per path segment:
//!
//! - `*` any run of characters (not crossing `/`)
//! - `?` any single character
//! - `[abc]`, `[a-z]`, `[!abc]` / `[^abc]` character classes
//!
//! As in `sh`, wildcards never match a leading `.` in a file name, and an
//! unterminated `[` is taken literally. There is no `**`; every pattern has a
//! fixed depth, which keeps expansion bounded even on trees that contain
//! self-referencing symlinks.

use crate::tree::{normalize, IsoTree};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnySeq,
    Class {
        ranges: Vec<(char, char)>,
        negated: bool,
    },
}

impl Token {
    fn is_wildcard(&self) -> bool {
        !matches!(self, Token::Literal(_))
    }

    fn matches_char(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::AnySeq => true,
            Token::Class { ranges, negated } => {
                let hit = ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi);
                hit != *negated
            }
        }
    }
}

/// One `/`-separated component of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    raw: String,
    tokens: Vec<Token>,
}

impl Segment {
    fn compile(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // Collapse runs of `*`.
                    if tokens.last() != Some(&Token::AnySeq) {
                        tokens.push(Token::AnySeq);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                '[' => match parse_class(&chars[i + 1..]) {
                    Some((token, consumed)) => {
                        tokens.push(token);
                        i += 1 + consumed;
                    }
                    None => {
                        tokens.push(Token::Literal('['));
                        i += 1;
                    }
                },
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }
        Self {
            raw: raw.to_string(),
            tokens,
        }
    }

    /// Whether the segment contains any wildcard.
    pub fn is_literal(&self) -> bool {
        !self.tokens.iter().any(Token::is_wildcard)
    }

    /// Match a single file name against this segment.
    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.chars().collect();
        if name.first() == Some(&'.')
            && self.tokens.first().is_some_and(Token::is_wildcard)
        {
            return false;
        }
        match_tokens(&self.tokens, &name)
    }
}

/// Parse the body of a `[...]` class. `rest` starts right after the `[`.
///
/// Returns the token and the number of chars consumed including the `]`.
fn parse_class(rest: &[char]) -> Option<(Token, usize)> {
    let mut i = 0;
    let negated = matches!(rest.first(), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    let mut first = true;
    while i < rest.len() {
        let c = rest[i];
        // A `]` right after the opening bracket is a literal member.
        if c == ']' && !first {
            return Some((Token::Class { ranges, negated }, i + 1));
        }
        first = false;
        if i + 2 < rest.len() && rest[i + 1] == '-' && rest[i + 2] != ']' {
            ranges.push((c, rest[i + 2]));
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }
    None
}

fn match_tokens(tokens: &[Token], name: &[char]) -> bool {
    match tokens.split_first() {
        None => name.is_empty(),
        Some((Token::AnySeq, rest)) => {
            (0..=name.len()).any(|skip| match_tokens(rest, &name[skip..]))
        }
        Some((token, rest)) => match name.split_first() {
            Some((c, tail)) => token.matches_char(*c) && match_tokens(rest, tail),
            None => false,
        },
    }
}

/// A compiled multi-segment glob pattern, relative to the ISO root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn new(source: &str) -> Self {
        let segments = normalize(source)
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Segment::compile)
            .collect();
        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a full relative path (leading `/` optional) against the pattern.
    pub fn matches_path(&self, path: &str) -> bool {
        let parts: Vec<&str> = normalize(path).split('/').filter(|s| !s.is_empty()).collect();
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| segment.matches(part))
    }
}

/// Expand `pattern` against `tree`.
///
/// Returns absolute (within the ISO) paths like `/casper/vmlinuz`, sorted.
/// Unreadable directories simply contribute no matches.
pub fn expand(tree: &dyn IsoTree, pattern: &Pattern) -> Vec<String> {
    let segments = pattern.segments();
    if segments.is_empty() {
        return Vec::new();
    }

    let mut frontier = vec![String::new()];
    for (depth, segment) in segments.iter().enumerate() {
        let last = depth + 1 == segments.len();
        let mut next = Vec::new();

        for dir in &frontier {
            if segment.is_literal() {
                let candidate = join(dir, &segment.raw);
                if tree.exists(&candidate) {
                    next.push(candidate);
                }
                continue;
            }

            let entries = match tree.read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    log::trace!("glob: skipping '/{}': {}", dir, err);
                    continue;
                }
            };
            for entry in entries {
                if !last && !entry.is_dir {
                    continue;
                }
                if segment.matches(&entry.name) {
                    next.push(join(dir, &entry.name));
                }
            }
        }

        if next.is_empty() {
            return Vec::new();
        }
        frontier = next;
    }

    let mut matches: Vec<String> = frontier.into_iter().map(|p| format!("/{p}")).collect();
    matches.sort();
    matches.dedup();
    matches
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

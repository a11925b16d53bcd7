//! Markup symbol sanitizer.
//!
//! Markdown extraction leaves behind characters that a speech engine reads
//! aloud literally ("hash", "asterisk"). The user picks which of them to strip;
//! structural separators become a space so neighbouring words stay apart,
//! decorative symbols are deleted.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TextError;

/// A symbol the sanitizer knows how to remove.
///
/// Declaration order is replacement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symbol {
    Pipe,
    Hyphen,
    Equals,
    DoubleUnderscore,
    Backtick,
    Asterisk,
    Hash,
    Exclamation,
    Brackets,
    Parentheses,
}

impl Symbol {
    /// Every symbol, in replacement order.
    pub const ALL: [Symbol; 10] = [
        Symbol::Pipe,
        Symbol::Hyphen,
        Symbol::Equals,
        Symbol::DoubleUnderscore,
        Symbol::Backtick,
        Symbol::Asterisk,
        Symbol::Hash,
        Symbol::Exclamation,
        Symbol::Brackets,
        Symbol::Parentheses,
    ];

    /// Kebab-case identifier used in config files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Symbol::Pipe => "pipe",
            Symbol::Hyphen => "hyphen",
            Symbol::Equals => "equals",
            Symbol::DoubleUnderscore => "double-underscore",
            Symbol::Backtick => "backtick",
            Symbol::Asterisk => "asterisk",
            Symbol::Hash => "hash",
            Symbol::Exclamation => "exclamation",
            Symbol::Brackets => "brackets",
            Symbol::Parentheses => "parentheses",
        }
    }

    /// Human-readable label, e.g. `Square Brackets ([])`.
    pub fn label(&self) -> &'static str {
        match self {
            Symbol::Pipe => "Pipes (|)",
            Symbol::Hyphen => "Hyphens (-)",
            Symbol::Equals => "Equals (=)",
            Symbol::DoubleUnderscore => "Double Underscores (__)",
            Symbol::Backtick => "Backticks (`)",
            Symbol::Asterisk => "Asterisks (*)",
            Symbol::Hash => "Hashes (#)",
            Symbol::Exclamation => "Exclamation Marks (!)",
            Symbol::Brackets => "Square Brackets ([])",
            Symbol::Parentheses => "Parentheses (())",
        }
    }

    /// Patterns matched by this symbol and what each one becomes.
    fn replacements(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Symbol::Pipe => &[("|", "")],
            Symbol::Hyphen => &[("-", " ")],
            Symbol::Equals => &[("=", " ")],
            Symbol::DoubleUnderscore => &[("__", " ")],
            Symbol::Backtick => &[("`", "")],
            Symbol::Asterisk => &[("*", "")],
            Symbol::Hash => &[("#", "")],
            Symbol::Exclamation => &[("!", "")],
            Symbol::Brackets => &[("[", ""), ("]", "")],
            Symbol::Parentheses => &[("(", ""), (")", "")],
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Symbol {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let symbol = match trimmed.to_lowercase().as_str() {
            "pipe" | "pipes" | "|" => Symbol::Pipe,
            "hyphen" | "hyphens" | "-" => Symbol::Hyphen,
            "equals" | "=" => Symbol::Equals,
            "double-underscore" | "double-underscores" | "__" => Symbol::DoubleUnderscore,
            "backtick" | "backticks" | "`" => Symbol::Backtick,
            "asterisk" | "asterisks" | "*" => Symbol::Asterisk,
            "hash" | "hashes" | "#" => Symbol::Hash,
            "exclamation" | "exclamation-mark" | "exclamation-marks" | "!" => {
                Symbol::Exclamation
            }
            "brackets" | "square-brackets" | "[]" => Symbol::Brackets,
            "parentheses" | "()" => Symbol::Parentheses,
            _ => return Err(TextError::UnknownSymbol(trimmed.to_string())),
        };
        Ok(symbol)
    }
}

/// Set of symbols to strip from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolSet(BTreeSet<Symbol>);

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Symbol::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, symbol: Symbol) -> bool {
        self.0.insert(symbol)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.0.contains(&symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.0.iter().copied()
    }

    /// Parse a list of names or literal symbols (`hyphen`, `#`, `[]`, ...).
    pub fn parse<I, S>(items: I) -> super::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        items
            .into_iter()
            .map(|s| s.as_ref().parse::<Symbol>())
            .collect()
    }
}

impl FromIterator<Symbol> for SymbolSet {
    fn from_iter<T: IntoIterator<Item = Symbol>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Strip every excluded symbol from `text`.
///
/// The text is scanned once, left to right. At each position the patterns of
/// the excluded symbols are tried in [`Symbol::ALL`] order and the first match
/// is replaced, so a substitute or a deletion never feeds a later match.
pub fn sanitize(text: &str, excluded: &SymbolSet) -> String {
    if excluded.is_empty() {
        return text.to_string();
    }

    let patterns: Vec<(&str, &str)> = Symbol::ALL
        .into_iter()
        .filter(|symbol| excluded.contains(*symbol))
        .flat_map(|symbol| symbol.replacements().iter().copied())
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match patterns.iter().find(|(pattern, _)| rest.starts_with(pattern)) {
            Some((pattern, substitute)) => {
                out.push_str(substitute);
                rest = &rest[pattern.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(symbols: &[Symbol]) -> SymbolSet {
        symbols.iter().copied().collect()
    }

    #[test]
    fn test_empty_exclusion_set_is_identity() {
        let text = "a | b - c = d __e__ `f` *g* #h !i [j] (k)";
        assert_eq!(sanitize(text, &SymbolSet::new()), text);
    }

    #[test]
    fn test_structural_symbols_become_spaces() {
        let excluded = set(&[Symbol::Hyphen, Symbol::Equals, Symbol::DoubleUnderscore]);
        let out = sanitize("well-known a=b x__y", &excluded);
        assert_eq!(out, "well known a b x y");
    }

    #[test]
    fn test_decorative_symbols_are_deleted() {
        let out = sanitize(
            "`code` **bold** # Title! [link](url) |cell|",
            &SymbolSet::all(),
        );
        assert_eq!(out, "code bold  Title linkurl cell");
    }

    #[test]
    fn test_only_selected_symbols_are_touched() {
        let out = sanitize("# Title - sub", &set(&[Symbol::Hash]));
        assert_eq!(out, " Title - sub");
    }

    #[test]
    fn test_brackets_remove_both_sides() {
        let out = sanitize("[a] (b)", &set(&[Symbol::Brackets]));
        assert_eq!(out, "a (b)");
        let out = sanitize("[a] (b)", &set(&[Symbol::Parentheses]));
        assert_eq!(out, "[a] b");
    }

    #[test]
    fn test_replacement_does_not_cascade() {
        // Removing the hyphen must not join the underscores into a double underscore.
        let out = sanitize("a_-_b", &set(&[Symbol::Hyphen, Symbol::DoubleUnderscore]));
        assert_eq!(out, "a_ _b");
    }

    #[test]
    fn test_deletion_does_not_create_double_underscore() {
        let out = sanitize("snake_|_case", &set(&[Symbol::Pipe, Symbol::DoubleUnderscore]));
        assert_eq!(out, "snake__case");
    }

    #[test]
    fn test_double_underscore_runs_pair_left_to_right() {
        let out = sanitize("a___b ____c", &set(&[Symbol::DoubleUnderscore]));
        assert_eq!(out, "a _b   c");
    }

    #[test]
    fn test_multibyte_text_preserved() {
        let out = sanitize("日本|語 — café", &set(&[Symbol::Pipe, Symbol::Hyphen]));
        assert_eq!(out, "日本語 — café");
    }

    #[test]
    fn test_symbol_parse_names_and_literals() {
        assert_eq!("hyphen".parse::<Symbol>().unwrap(), Symbol::Hyphen);
        assert_eq!("-".parse::<Symbol>().unwrap(), Symbol::Hyphen);
        assert_eq!("__".parse::<Symbol>().unwrap(), Symbol::DoubleUnderscore);
        assert_eq!("[]".parse::<Symbol>().unwrap(), Symbol::Brackets);
        assert_eq!(" HASH ".parse::<Symbol>().unwrap(), Symbol::Hash);
        assert_eq!(
            "tilde".parse::<Symbol>(),
            Err(TextError::UnknownSymbol("tilde".to_string()))
        );
    }

    #[test]
    fn test_symbol_set_parse() {
        let parsed = SymbolSet::parse(["hyphen", "#"]).unwrap();
        assert!(parsed.contains(Symbol::Hyphen));
        assert!(parsed.contains(Symbol::Hash));
        assert!(!parsed.contains(Symbol::Pipe));
        assert!(SymbolSet::parse(["nope"]).is_err());
    }

    #[test]
    fn test_symbol_set_serde_kebab_case() {
        let parsed: SymbolSet = serde_json::from_str(r#"["double-underscore","pipe"]"#).unwrap();
        assert!(parsed.contains(Symbol::DoubleUnderscore));
        assert!(parsed.contains(Symbol::Pipe));
        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, r#"["pipe","double-underscore"]"#);
    }
}

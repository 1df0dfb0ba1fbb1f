//! Canonicalization of product names before embedding.
//!
//! Dealer names are noisy: Cyrillic and Latin words glued together, the
//! manufacturer brand repeated in every title, packaging notes in brackets
//! and comma clauses. The pipeline below reduces both catalog and dealer
//! names to the same plain form.

use std::sync::LazyLock;

use regex::Regex;

/// Brand tokens removed from every name by default. Matched after
/// lower-casing, so one spelling per script is enough.
pub const DEFAULT_BRAND_TOKENS: &[&str] = &["prosept", "просепт"];

static COMMA_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s").expect("valid comma regex"));
static BRACKETS_AND_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[()\s]").expect("valid bracket regex"));
static SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["\-/]"#).expect("valid symbol regex"));
static DUPLICATE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid space regex"));

// Upper bound on fixed-point passes; real input settles after one or two.
const MAX_PASSES: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Script {
    Cyrillic,
    Latin,
    Other,
}

fn script_of(c: char) -> Script {
    match c {
        'а'..='я' | 'ё' | 'А'..='Я' | 'Ё' => Script::Cyrillic,
        'a'..='z' | 'A'..='Z' => Script::Latin,
        _ => Script::Other,
    }
}

/// Lower-cases `raw` and splits glued Cyrillic/Latin words with a space.
fn split_scripts(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len() + 8);
    let mut previous = Script::Other;
    for c in lowered.chars() {
        let current = script_of(c);
        if matches!(
            (previous, current),
            (Script::Cyrillic, Script::Latin) | (Script::Latin, Script::Cyrillic)
        ) {
            out.push(' ');
        }
        out.push(c);
        previous = current;
    }
    out
}

/// Text-cleaning pipeline with a configurable set of brand tokens.
#[derive(Clone, Debug)]
pub struct Normalizer {
    brand_tokens: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_BRAND_TOKENS.iter().copied())
    }
}

impl Normalizer {
    /// Builds a normalizer removing the given brand tokens. Tokens are
    /// lower-cased; blank tokens are ignored.
    pub fn new<I, S>(brand_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let brand_tokens = brand_tokens
            .into_iter()
            .map(|token| token.as_ref().trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();
        Self { brand_tokens }
    }

    pub fn brand_tokens(&self) -> &[String] {
        &self.brand_tokens
    }

    /// Returns the canonical comparison string for `raw`.
    ///
    /// Total and pure. The pipeline is repeated until the output stops
    /// changing, which makes the function idempotent.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = self.normalize_once(raw);
        for _ in 0..MAX_PASSES {
            let next = self.normalize_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn normalize_once(&self, raw: &str) -> String {
        let text = split_scripts(raw);
        let text = COMMA_CLAUSE.replace_all(&text, " ");
        let text = BRACKETS_AND_WHITESPACE.replace_all(&text, " ");
        let text = self.strip_brands(&text);
        let text = SYMBOLS.replace_all(&text, " ");
        let text = DUPLICATE_SPACES.replace_all(&text, " ");
        text.trim().to_string()
    }

    fn strip_brands(&self, text: &str) -> String {
        let mut text = text.to_string();
        loop {
            let before = text.len();
            for token in &self.brand_tokens {
                text = text.replace(token.as_str(), "");
            }
            if text.len() == before {
                return text;
            }
        }
    }
}

/// Normalizes with the default brand tokens.
pub fn normalize(raw: &str) -> String {
    static DEFAULT: LazyLock<Normalizer> = LazyLock::new(Normalizer::default);
    DEFAULT.normalize(raw)
}

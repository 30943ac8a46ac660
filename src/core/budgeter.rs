use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};
use xxhash_rust::xxh64::Xxh64;

/// Measures text length in tokens.
///
/// The assembler treats any counter as a black box; the only requirement is
/// that it is deterministic for a given input.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// Which counter the CLI should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// BPE tokenizer for the configured model
    #[default]
    Tiktoken,

    /// One token per character
    Chars,

    /// Roughly four characters per token
    Approx,
}

/// Character count; exact and tokenizer-free
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// `ceil(chars / 4)`, the usual rule of thumb for English and code
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxCounter;

impl TokenCounter for ApproxCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// Token counter backed by tiktoken-rs with a count cache
pub struct Budgeter {
    /// Byte Pair Encoding (BPE) tokenizer for counting tokens
    bpe: CoreBPE,

    /// Token count cache for fast repeated queries
    cache: Cache<u64, usize>,
}

impl Budgeter {
    /// Create a new Budgeter for a given model or encoding name.
    ///
    /// Accepts model names ("gpt-4o", "gpt-4") or encoding names
    /// ("cl100k_base", "o200k_base"), case-insensitively.
    ///
    /// # Errors
    /// Returns an error if the model or encoding is unsupported or cannot be loaded.
    pub fn new(model_or_encoding: &str) -> Result<Self> {
        let lower = model_or_encoding.to_ascii_lowercase();

        let bpe = match get_bpe_from_model(&lower) {
            Ok(b) => b,
            Err(_) => match lower.as_str() {
                "o200k_base" => o200k_base().context("load o200k_base")?,
                "cl100k_base" => cl100k_base().context("load cl100k_base")?,
                _ => return Err(anyhow!("Unsupported model/encoding: {model_or_encoding}")),
            },
        };

        Ok(Self {
            bpe,
            cache: Cache::new(100_000),
        })
    }

    /// Count tokens in `s`, keyed in the cache by its xxhash64 digest
    pub fn count(&self, s: &str) -> usize {
        let mut hasher = Xxh64::new(0);
        hasher.update(s.as_bytes());
        let key = hasher.digest();

        if let Some(t) = self.cache.get(&key) {
            return t;
        }

        let t = self.bpe.encode_ordinary(s).len();
        self.cache.insert(key, t);
        t
    }
}

impl TokenCounter for Budgeter {
    fn count(&self, text: &str) -> usize {
        Budgeter::count(self, text)
    }
}

/// Build the counter selected by `kind`
///
/// # Errors
/// Fails only for [`CounterKind::Tiktoken`] when `model` is unknown.
pub fn counter_for(kind: CounterKind, model: &str) -> Result<Box<dyn TokenCounter>> {
    Ok(match kind {
        CounterKind::Tiktoken => Box::new(Budgeter::new(model)?),
        CounterKind::Chars => Box::new(CharCounter),
        CounterKind::Approx => Box::new(ApproxCounter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_counters() {
        let words = |s: &str| s.split_whitespace().count();
        assert_eq!(TokenCounter::count(&words, "a b  c"), 3);
    }

    #[test]
    fn char_and_approx_counts() {
        assert_eq!(CharCounter.count("héllo"), 5);
        assert_eq!(ApproxCounter.count(""), 0);
        assert_eq!(ApproxCounter.count("abcd"), 1);
        assert_eq!(ApproxCounter.count("abcde"), 2);
    }

    #[test]
    fn budgeter_is_cached_and_stable() {
        let b = Budgeter::new("gpt-4o").unwrap();
        let first = b.count("fn main() { println!(\"hi\"); }");
        assert!(first > 0);
        assert_eq!(b.count("fn main() { println!(\"hi\"); }"), first);
        assert_eq!(b.count(""), 0);
    }

    #[test]
    fn encoding_names_and_unknown_models() {
        assert!(Budgeter::new("CL100K_BASE").is_ok());
        assert!(Budgeter::new("no-such-model").is_err());
        assert!(counter_for(CounterKind::Chars, "no-such-model").is_ok());
    }
}

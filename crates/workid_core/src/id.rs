//! Record id generation.
//!
//! Pattern ids fill each placeholder of a template such as `XXXX-XXXX`
//! from an alphabet without look-alike characters (`O`, `0`). Sequence
//! ids come from an atomic counter in the backing store. Either way a
//! candidate is only returned once the caller confirms it is unused.

use crate::config::IdScheme;
use crate::error::{CoreError, CoreResult};
use crate::model::MAX_ID_LEN;
use rand::Rng;
use std::sync::Arc;
use workid_storage::KvBackend;

/// Characters drawn for placeholders.
pub const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNPQRSTUVWXYZ123456789";

/// Letter-only prefix of [`ID_ALPHABET`].
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Literal(char),
    Placeholder,
}

/// A parsed id template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPattern {
    slots: Vec<Slot>,
    letter_first: bool,
}

impl IdPattern {
    /// Parses `pattern`, treating every `placeholder` as a random position.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an empty pattern or one that would produce ids
    /// unusable as keys (whitespace, control characters, `:` or longer
    /// than a client id may be).
    pub fn parse(pattern: &str, placeholder: char) -> CoreResult<Self> {
        if pattern.is_empty() {
            return Err(CoreError::config("id pattern must not be empty"));
        }
        if pattern.contains(':')
            || pattern.contains(char::is_whitespace)
            || pattern.contains(char::is_control)
        {
            return Err(CoreError::config(format!(
                "id pattern `{}` must not contain ':', whitespace or control characters",
                pattern.escape_debug()
            )));
        }
        let len = pattern.chars().count();
        if len > MAX_ID_LEN {
            return Err(CoreError::config(format!(
                "id pattern is {len} characters long, ids are limited to {MAX_ID_LEN}"
            )));
        }
        let slots = pattern
            .chars()
            .map(|c| {
                if c == placeholder {
                    Slot::Placeholder
                } else {
                    Slot::Literal(c)
                }
            })
            .collect();
        Ok(Self {
            slots,
            letter_first: false,
        })
    }

    /// Draws the first placeholder from letters only.
    #[must_use]
    pub const fn letter_first(mut self, letter_first: bool) -> Self {
        self.letter_first = letter_first;
        self
    }

    /// Number of random positions.
    #[must_use]
    pub fn placeholders(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| **slot == Slot::Placeholder)
            .count()
    }

    /// Number of distinct ids this pattern can produce, saturating.
    #[must_use]
    pub fn capacity(&self) -> u128 {
        let mut total: u128 = 1;
        for index in 0..self.placeholders() {
            let width = if index == 0 && self.letter_first {
                LETTERS.len()
            } else {
                ID_ALPHABET.len()
            };
            total = total.saturating_mul(width as u128);
        }
        total
    }

    /// Fills the pattern with fresh random characters.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut out = String::with_capacity(self.slots.len());
        let mut first = true;
        for slot in &self.slots {
            match slot {
                Slot::Literal(c) => out.push(*c),
                Slot::Placeholder => {
                    let alphabet = if first && self.letter_first {
                        LETTERS
                    } else {
                        ID_ALPHABET
                    };
                    first = false;
                    out.push(char::from(alphabet[rng.gen_range(0..alphabet.len())]));
                }
            }
        }
        out
    }
}

enum Source {
    Pattern(IdPattern),
    Sequence {
        backend: Arc<dyn KvBackend>,
        counter_key: String,
        width: usize,
    },
}

/// Produces unused record ids.
pub struct IdGenerator {
    source: Source,
    max_attempts: u32,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("IdGenerator");
        match &self.source {
            Source::Pattern(pattern) => debug.field("pattern", pattern),
            Source::Sequence { counter_key, .. } => debug.field("counter_key", counter_key),
        };
        debug.field("max_attempts", &self.max_attempts).finish()
    }
}

impl IdGenerator {
    /// Creates a generator for `scheme`. The backend is only used by the
    /// sequence scheme.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unusable pattern or a sequence width past
    /// the id length limit.
    pub fn new(
        scheme: &IdScheme,
        max_attempts: u32,
        backend: Arc<dyn KvBackend>,
    ) -> CoreResult<Self> {
        let source = match scheme {
            IdScheme::Pattern {
                pattern,
                placeholder,
                letter_first,
            } => Source::Pattern(IdPattern::parse(pattern, *placeholder)?.letter_first(*letter_first)),
            IdScheme::Sequence { width, .. } if *width > MAX_ID_LEN => {
                return Err(CoreError::config(format!(
                    "sequence width {width} exceeds the id length limit of {MAX_ID_LEN}"
                )));
            }
            IdScheme::Sequence { counter_key, width } => Source::Sequence {
                backend,
                counter_key: counter_key.clone(),
                width: *width,
            },
        };
        Ok(Self {
            source,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Creates a pattern generator.
    #[must_use]
    pub fn from_pattern(pattern: IdPattern, max_attempts: u32) -> Self {
        Self {
            source: Source::Pattern(pattern),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns a candidate id without checking whether it is in use.
    ///
    /// Under the sequence scheme this consumes a counter value.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the counter cannot be advanced.
    pub fn generate_unchecked(&self) -> CoreResult<String> {
        match &self.source {
            Source::Pattern(pattern) => Ok(pattern.sample(&mut rand::thread_rng())),
            Source::Sequence {
                backend,
                counter_key,
                width,
            } => {
                let next = backend.incr(counter_key)?;
                Ok(format!("{next:0width$}", width = *width))
            }
        }
    }

    /// Returns the first candidate for which `is_taken` answers `false`.
    ///
    /// `is_taken` may also claim the id (for example with an atomic
    /// set-if-absent) and report whether the claim failed.
    ///
    /// # Errors
    ///
    /// Returns `IdSpaceExhausted` once the attempt budget is spent, or the
    /// first error raised by `is_taken`.
    pub fn generate<F>(&self, mut is_taken: F) -> CoreResult<String>
    where
        F: FnMut(&str) -> CoreResult<bool>,
    {
        let budget = match &self.source {
            Source::Pattern(pattern) if pattern.placeholders() == 0 => 1,
            _ => self.max_attempts,
        };
        for attempt in 1..=budget {
            let candidate = self.generate_unchecked()?;
            if !is_taken(&candidate)? {
                return Ok(candidate);
            }
            tracing::debug!(attempt, candidate = %candidate, "id collision, retrying");
        }
        tracing::warn!(attempts = budget, "id generation exhausted its attempt budget");
        Err(CoreError::IdSpaceExhausted { attempts: budget })
    }
}

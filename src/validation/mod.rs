//! Field Validation and Formatting
//!
//! Pure functions behind the time-of-day input.
//!
//! # Two Stages
//! - [`validate_keystroke`] is a gate evaluated before a keystroke is
//!   committed. It never transforms the text.
//! - [`normalize_time_of_day`] runs once when the field loses focus or the
//!   form is submitted, and replaces the field text wholesale.
//!
//! [`TimeBuffer`] ties both together for a caret-aware text field.

/// Maximum number of digits in a time of day (`HHMMSS`)
pub const MAX_TIME_DIGITS: usize = 6;

/// Largest hour accepted by the normalizer (`24:00` is a valid closing time)
const MAX_HOUR: u32 = 24;

/// Largest minute or second accepted by the normalizer
const MAX_MINUTE: u32 = 59;

/// Check whether `incoming` may be committed into a field holding `current`
///
/// - An empty `incoming` is a deletion and is always accepted.
/// - Anything other than ASCII digits and `:` is rejected.
/// - The edit is rejected when the result would hold more than
///   [`MAX_TIME_DIGITS`] characters once `:` is stripped.
#[must_use]
pub fn validate_keystroke(current: &str, incoming: &str) -> bool {
    if incoming.is_empty() {
        return true;
    }

    if !incoming.chars().all(is_time_char) {
        return false;
    }

    significant_len(current) + significant_len(incoming) <= MAX_TIME_DIGITS
}

/// Normalize a raw time buffer into `HH`, `HH:MM` or `HH:MM:SS`
///
/// The number of groups follows the number of digits typed: 1-2 digits give
/// `HH`, 3-4 give `HH:MM`, 5-6 give `HH:MM:SS`. Single-digit groups are
/// zero-padded. An odd-length run whose first two digits cannot be an hour is
/// read with a one-digit hour, so `"930"` becomes `"09:30"`.
///
/// Out-of-range groups are clamped by replacing the first occurrence of the
/// group's text (hour above 24 → `24`, minute or second above 59 → `59`).
#[must_use]
pub fn normalize_time_of_day(current: &str) -> String {
    let mut digits: String =
        current.chars().filter(char::is_ascii_digit).take(MAX_TIME_DIGITS).collect();

    if digits.is_empty() {
        return String::new();
    }

    if digits.len() % 2 == 1 && digits.len() > 1 && group_value(&digits[..2]) > MAX_HOUR {
        digits.insert(0, '0');
    }

    let hours = pad_group(&digits[..digits.len().min(2)]);
    let minutes = group_at(&digits, 2);
    let seconds = group_at(&digits, 4);

    let mut formatted = match (&minutes, &seconds) {
        (Some(m), Some(s)) => format!("{hours}:{m}:{s}"),
        (Some(m), None) => format!("{hours}:{m}"),
        _ => hours.clone(),
    };

    let hour_value = group_value(&hours);
    if hour_value > MAX_HOUR {
        formatted = formatted.replacen(&hour_value.to_string(), "24", 1);
    }

    let minutes = minutes.unwrap_or_else(|| "00".to_string());
    if group_value(&minutes) > MAX_MINUTE {
        formatted = formatted.replacen(&minutes, "59", 1);
    }

    let seconds = seconds.unwrap_or_else(|| "00".to_string());
    if group_value(&seconds) > MAX_MINUTE {
        formatted = formatted.replacen(&seconds, "59", 1);
    }

    formatted
}

/// Fill the groups a normalized time leaves out with `00`
///
/// `"09"` → `"09:00:00"`, `"09:30"` → `"09:30:00"`. Empty stays empty.
#[must_use]
pub fn complete_time_of_day(normalized: &str) -> String {
    if normalized.is_empty() {
        return String::new();
    }

    let mut groups: Vec<&str> = normalized.split(':').collect();
    while groups.len() < 3 {
        groups.push("00");
    }
    groups.join(":")
}

fn is_time_char(ch: char) -> bool {
    ch.is_ascii_digit() || ch == ':'
}

fn significant_len(text: &str) -> usize {
    text.chars().filter(|ch| *ch != ':').count()
}

fn pad_group(group: &str) -> String {
    format!("{group:0>2}")
}

fn group_at(digits: &str, start: usize) -> Option<String> {
    digits
        .get(start..digits.len().min(start + 2))
        .filter(|group| !group.is_empty())
        .map(pad_group)
}

fn group_value(group: &str) -> u32 {
    group.parse().unwrap_or(0)
}

/// Incremental state of one time-of-day field
///
/// Holds the raw text and a caret. Every insertion goes through
/// [`validate_keystroke`]; deletions always succeed. The buffer only ever
/// holds ASCII, so the caret is a byte offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeBuffer {
    text: String,
    caret: usize,
}

impl TimeBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Caret position (0 = before the first character)
    #[must_use]
    pub const fn caret(&self) -> usize {
        self.caret
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Move the caret, clamped to the text length
    pub fn set_caret(&mut self, position: usize) {
        self.caret = position.min(self.text.len());
    }

    /// Insert `incoming` at the caret if the gate accepts it
    ///
    /// Returns `false` (and leaves the buffer untouched) on rejection.
    pub fn insert(&mut self, incoming: &str) -> bool {
        if !validate_keystroke(&self.text, incoming) {
            return false;
        }

        self.text.insert_str(self.caret, incoming);
        self.caret += incoming.len();
        true
    }

    /// Remove the character before the caret
    pub fn backspace(&mut self) -> bool {
        if self.caret == 0 {
            return false;
        }

        self.caret -= 1;
        self.text.remove(self.caret);
        true
    }

    /// Remove the character after the caret
    pub fn delete(&mut self) -> bool {
        if self.caret >= self.text.len() {
            return false;
        }

        self.text.remove(self.caret);
        true
    }

    /// Replace the text with its normalized form and move the caret to the end
    pub fn finalize(&mut self) -> &str {
        self.text = normalize_time_of_day(&self.text);
        self.caret = self.text.len();
        &self.text
    }
}

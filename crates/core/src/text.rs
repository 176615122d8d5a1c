//! Text normalization helpers for Spanish utterances

/// An utterance in the three shapes the rules look at.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub raw: String,
    pub lower: String,
    /// Lowercase with accents removed (ñ kept)
    pub folded: String,
}

impl Utterance {
    pub fn new(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let folded = fold(&lower);
        Self {
            raw: raw.to_string(),
            lower,
            folded,
        }
    }

    /// Phrase test against the folded text. `phrase` must already be folded.
    pub fn has(&self, phrase: &str) -> bool {
        has_phrase(&self.folded, phrase)
    }

    pub fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.has(p))
    }

    /// Plain substring test against the folded text, so inflections
    /// ("ayudar", "semanas") still match their stem.
    pub fn contains_any(&self, needles: &[&str]) -> bool {
        needles
            .iter()
            .any(|n| !n.is_empty() && self.folded.contains(n))
    }
}

/// Lowercase and strip acute accents and diaeresis.
pub fn fold(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' | 'ì' => 'i',
            'ó' | 'ò' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Substring test that only accepts matches on word boundaries.
pub fn has_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Case- and accent-insensitive containment
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    let needle = fold(needle);
    !needle.is_empty() && fold(haystack).contains(&needle)
}

/// Uppercase the first character, leave the rest untouched
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

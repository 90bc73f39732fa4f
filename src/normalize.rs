//! Case- and accent-insensitive text canonicalization.
//!
//! Used to match category and subcategory names typed by users
//! ("Produção", "PRODUCAO", "produção") against fixed vocabularies.

use unicode_normalization::UnicodeNormalization;

/// Combining diacritical marks block (U+0300–U+036F).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Lower-cases `text`, decomposes it (NFD) and drops combining marks.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

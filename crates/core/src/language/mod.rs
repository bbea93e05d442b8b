//! Language code handling and subtitle language verification.
//!
//! Operators configure languages with whatever code they know (`nl`, `nld`,
//! `dut`, or `dutch`). Providers report ISO 639-1 or 639-2 codes, Plex
//! labels streams with ISO 639-2/T, and detection yields ISO 639-3. The
//! table below lets all of them be compared.

mod verifier;

pub use verifier::{LanguageVerifier, TextLanguageVerifier, VerificationError, Verdict};

/// One row of the language table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1
    pub alpha2: &'static str,
    /// ISO 639-2/T
    pub alpha3t: &'static str,
    /// ISO 639-2/B
    pub alpha3b: &'static str,
    /// English name, lower-case.
    pub name: &'static str,
}

const fn lang(
    alpha2: &'static str,
    alpha3t: &'static str,
    alpha3b: &'static str,
    name: &'static str,
) -> Language {
    Language {
        alpha2,
        alpha3t,
        alpha3b,
        name,
    }
}

static LANGUAGES: &[Language] = &[
    lang("ar", "ara", "ara", "arabic"),
    lang("bg", "bul", "bul", "bulgarian"),
    lang("ca", "cat", "cat", "catalan"),
    lang("cs", "ces", "cze", "czech"),
    lang("da", "dan", "dan", "danish"),
    lang("de", "deu", "ger", "german"),
    lang("el", "ell", "gre", "greek"),
    lang("en", "eng", "eng", "english"),
    lang("es", "spa", "spa", "spanish"),
    lang("et", "est", "est", "estonian"),
    lang("fa", "fas", "per", "persian"),
    lang("fi", "fin", "fin", "finnish"),
    lang("fr", "fra", "fre", "french"),
    lang("he", "heb", "heb", "hebrew"),
    lang("hi", "hin", "hin", "hindi"),
    lang("hr", "hrv", "hrv", "croatian"),
    lang("hu", "hun", "hun", "hungarian"),
    lang("id", "ind", "ind", "indonesian"),
    lang("is", "isl", "ice", "icelandic"),
    lang("it", "ita", "ita", "italian"),
    lang("ja", "jpn", "jpn", "japanese"),
    lang("ko", "kor", "kor", "korean"),
    lang("lt", "lit", "lit", "lithuanian"),
    lang("lv", "lav", "lav", "latvian"),
    lang("nl", "nld", "dut", "dutch"),
    lang("no", "nor", "nor", "norwegian"),
    lang("pl", "pol", "pol", "polish"),
    lang("pt", "por", "por", "portuguese"),
    lang("ro", "ron", "rum", "romanian"),
    lang("ru", "rus", "rus", "russian"),
    lang("sk", "slk", "slo", "slovak"),
    lang("sl", "slv", "slv", "slovenian"),
    lang("sr", "srp", "srp", "serbian"),
    lang("sv", "swe", "swe", "swedish"),
    lang("th", "tha", "tha", "thai"),
    lang("tr", "tur", "tur", "turkish"),
    lang("uk", "ukr", "ukr", "ukrainian"),
    lang("vi", "vie", "vie", "vietnamese"),
    lang("zh", "zho", "chi", "chinese"),
];

/// Look up a language by any of its codes or its English name.
pub fn lookup(code_or_name: &str) -> Option<&'static Language> {
    let needle = code_or_name.trim().to_ascii_lowercase();
    LANGUAGES.iter().find(|l| {
        l.alpha2 == needle || l.alpha3t == needle || l.alpha3b == needle || l.name == needle
    })
}

/// Every code accepted as "the same language" as `language`.
///
/// Unknown languages only accept themselves, lower-cased.
pub fn allowed_codes(language: &str) -> Vec<String> {
    match lookup(language) {
        Some(l) => {
            let mut codes: Vec<String> = Vec::with_capacity(4);
            for code in [l.alpha2, l.alpha3t, l.alpha3b, l.name] {
                if !codes.iter().any(|c| c == code) {
                    codes.push(code.to_string());
                }
            }
            codes
        }
        None => vec![language.trim().to_ascii_lowercase()],
    }
}

/// Plex labels subtitle streams with ISO 639-2/T codes.
pub fn to_plex_code(language: &str) -> String {
    match lookup(language) {
        Some(l) => l.alpha3t.to_string(),
        None => language.trim().to_ascii_lowercase(),
    }
}

/// ISO 639-1 code for `language`, if it has one in the table.
pub fn to_alpha2(language: &str) -> Option<&'static str> {
    lookup(language).map(|l| l.alpha2)
}

/// Whether `code` is a known language code or name.
pub fn is_valid_code(code: &str) -> bool {
    lookup(code).is_some()
}

/// Whether a detected or reported code denotes the expected language.
pub fn codes_match(detected: &str, expected: &str) -> bool {
    let detected = detected.trim().to_ascii_lowercase();
    if detected == expected.trim().to_ascii_lowercase() {
        return true;
    }
    allowed_codes(expected).iter().any(|c| *c == detected)
}

//! Comment text cleaning and language tagging.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use whatlang::Lang;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(https?://|www\.)\S+").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Strips markup, anchors and links from a comment and normalizes whitespace.
///
/// Anchor elements are dropped together with their text since YouTube renders
/// timestamps and links as `<a>`.
pub fn clean_text(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let mut text = String::with_capacity(raw.len());
    collect_text(fragment.root_element(), &mut text);

    let text = URL_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            match child_element.value().name() {
                "a" => continue,
                "br" => out.push(' '),
                _ => collect_text(child_element, out),
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Detects the language of a text. Returns the ISO 639-1 code where one is
/// known, the ISO 639-3 code otherwise and `unknown` when nothing was detected.
pub fn detect_language(text: &str) -> String {
    match whatlang::detect_lang(text) {
        Some(lang) => iso_639_1(lang)
            .map(str::to_string)
            .unwrap_or_else(|| lang.code().to_string()),
        None => UNKNOWN_LANGUAGE.to_string(),
    }
}

fn iso_639_1(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Ces => "cs",
        Lang::Hun => "hu",
        Lang::Ron => "ro",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Nob => "no",
        Lang::Ell => "el",
        Lang::Tur => "tr",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Ara => "ar",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Vie => "vi",
        Lang::Ind => "id",
        Lang::Tha => "th",
        _ => return None,
    };
    Some(code)
}

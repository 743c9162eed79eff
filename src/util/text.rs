/// テキスト処理ユーティリティ。
///
/// マークアップ除去、空白正規化、語境界での切り詰め、重複判定キーの生成などを提供します。
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex"));

/// 切り詰め時に付与する省略記号。
pub const ELLIPSIS: &str = "...";

/// HTMLタグを除去し、実体参照をデコードし、空白を1つに畳み込む。
///
/// 結果はNFC正規化され、前後の空白は取り除かれる。
#[must_use]
pub fn strip_markup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let without_tags = TAG_RE.replace_all(text, "");
    let decoded = html_escape::decode_html_entities(&without_tags);
    let normalized = decoded.nfc().collect::<String>();
    collapse_whitespace(&normalized)
}

/// 連続する空白を単一のスペースにまとめ、前後をトリムする。
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// `max_chars` 文字を超えるテキストを最後の語境界で切り詰め、省略記号を付ける。
///
/// 先頭 `max_chars` 文字の中に空白が無い場合（中国語・日本語など）は、
/// その位置でそのまま切り詰める。
#[must_use]
pub fn truncate_on_word_boundary(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let kept = head.rfind(' ').map_or(head, |idx| &head[..idx]);
    format!("{kept}{ELLIPSIS}")
}

/// 文字数ベースで切り詰める（語境界は考慮しない）。
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

/// 近似重複検出用のタイトル比較キー。
///
/// 小文字化し、句読点を除去し、空白を畳み込む。
#[must_use]
pub fn title_comparison_key(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = PUNCTUATION_RE.replace_all(&lowered, "");
    collapse_whitespace(&stripped)
}

/// タイトルのMD5ダイジェスト（32桁の16進数）。
#[must_use]
pub fn title_digest(title: &str) -> String {
    format!("{:x}", md5::compute(title.as_bytes()))
}

/// 英字の連なりごとに先頭を大文字、残りを小文字にする。
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<p>Hello <b>World</b></p>", "Hello World")]
    #[case("Tom &amp; Jerry", "Tom & Jerry")]
    #[case("Hello    World\n\nTest", "Hello World Test")]
    #[case("<a href=\"x\">\n  台股 &quot;大漲&quot;</a>", "台股 \"大漲\"")]
    #[case("", "")]
    #[case("   ", "")]
    fn strip_markup_cleans_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_markup(input), expected);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_on_word_boundary("short text", 500), "short text");
    }

    #[test]
    fn truncate_cuts_at_last_space() {
        let text = "alpha beta gamma delta";
        assert_eq!(truncate_on_word_boundary(text, 13), "alpha beta...");
    }

    #[test]
    fn truncate_without_spaces_cuts_hard() {
        let text = "颱風".repeat(300);
        let truncated = truncate_on_word_boundary(&text, 500);
        assert_eq!(truncated.chars().count(), 500 + ELLIPSIS.len());
        assert!(truncated.ends_with(ELLIPSIS));
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("日本語のテキスト", 3), "日本語...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[rstest]
    #[case("Hello WORLD", "hello world")]
    #[case("Hello, World!", "hello world")]
    #[case("Hello   World", "hello world")]
    #[case("Storm Hits City!!", "storm hits city")]
    #[case("「颱風」來襲！", "颱風來襲")]
    fn title_comparison_key_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(title_comparison_key(input), expected);
    }

    #[test]
    fn title_digest_is_stable_md5() {
        let digest = title_digest("My Article Title");
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, title_digest("My Article Title"));
        assert_ne!(digest, title_digest("Another Title"));
    }

    #[rstest]
    #[case("bbc", "Bbc")]
    #[case("NYTIMES", "Nytimes")]
    #[case("news-site", "News-Site")]
    fn title_case_capitalizes_words(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(title_case(input), expected);
    }
}

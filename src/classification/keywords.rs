//! 優先度順キーワード照合。
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, BuildError, MatchKind};

use super::rules::KeywordRule;
use crate::catalog::ValidCategories;

/// 一致したキーワード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit<'a> {
    pub category: &'a str,
    pub keyword: &'a str,
    pub priority: i64,
}

/// 1ルール分の Aho-Corasick オートマトン。
#[derive(Debug)]
struct CompiledRule {
    rule: KeywordRule,
    automaton: AhoCorasick,
}

impl CompiledRule {
    fn new(rule: KeywordRule) -> Result<Self, BuildError> {
        let patterns: Vec<String> = rule
            .keywords
            .iter()
            .map(|keyword| keyword.to_lowercase())
            .collect();
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&patterns)?;
        Ok(Self { rule, automaton })
    }

    /// ソース順で最初に現れるキーワード（テキスト上の位置ではない）。
    fn first_keyword(&self, haystack: &str) -> Option<&str> {
        self.automaton
            .find_overlapping_iter(haystack)
            .map(|found| found.pattern().as_usize())
            .min()
            .and_then(|index| self.rule.keywords.get(index))
            .map(String::as_str)
    }
}

/// 優先度順に並んだキーワードルール群。
#[derive(Debug)]
pub struct KeywordCascade {
    rules: Vec<CompiledRule>,
}

impl KeywordCascade {
    /// `rules` は評価順（優先度昇順）で渡すこと。
    ///
    /// # Errors
    /// オートマトンの構築に失敗した場合は [`BuildError`] を返す。
    pub fn compile(rules: &[KeywordRule]) -> Result<Self, BuildError> {
        let rules = rules
            .iter()
            .cloned()
            .map(CompiledRule::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// 有効カテゴリに属するルールのうち、最初に一致したキーワードを返す。
    ///
    /// `text` は小文字化済みであること。
    #[must_use]
    pub fn first_match<'a>(
        &'a self,
        text: &str,
        valid: &ValidCategories,
    ) -> Option<KeywordHit<'a>> {
        self.rules
            .iter()
            .filter(|compiled| valid.contains(&compiled.rule.category))
            .find_map(|compiled| {
                compiled.first_keyword(text).map(|keyword| KeywordHit {
                    category: &compiled.rule.category,
                    keyword,
                    priority: compiled.rule.priority,
                })
            })
    }
}

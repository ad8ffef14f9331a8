//! キーワード検索
//!
//! コレクションを線形走査し、いずれかの検索語がキーワード列の部分文字列であれば一致とする。

use crate::types::PhotoRecord;

/// 検索結果
#[derive(Debug, PartialEq)]
pub enum SearchOutcome<'a> {
    /// 検索語が空（「結果0件」とは区別する）
    NoQuery,
    /// 一致したレコード（コレクションの挿入順）
    Matches(Vec<&'a PhotoRecord>),
}

impl<'a> SearchOutcome<'a> {
    pub fn matches(&self) -> &[&'a PhotoRecord] {
        match self {
            SearchOutcome::NoQuery => &[],
            SearchOutcome::Matches(records) => records,
        }
    }

    pub fn is_no_query(&self) -> bool {
        matches!(self, SearchOutcome::NoQuery)
    }
}

/// 検索文字列を小文字化し、空白で分割する
pub fn parse_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// コレクションをキーワードで検索
///
/// # Arguments
/// * `records` - 検索対象（挿入順）
/// * `query` - 空白区切りの検索語
///
/// # Returns
/// 空/空白のみのクエリは `SearchOutcome::NoQuery`、それ以外は一致レコード
pub fn search<'a>(records: &'a [PhotoRecord], query: &str) -> SearchOutcome<'a> {
    let terms = parse_query(query);
    if terms.is_empty() {
        return SearchOutcome::NoQuery;
    }

    let matches = records
        .iter()
        .filter(|record| {
            let haystack = record.keyword_haystack();
            terms.iter().any(|term| haystack.contains(term.as_str()))
        })
        .collect();

    SearchOutcome::Matches(matches)
}

/// 検索語を含むキーワード（結果表示のハイライト用）
pub fn matched_keywords<'a>(record: &'a PhotoRecord, terms: &[String]) -> Vec<&'a str> {
    record
        .keywords()
        .iter()
        .filter(|keyword| {
            let lower = keyword.to_lowercase();
            terms.iter().any(|term| lower.contains(term.as_str()))
        })
        .map(String::as_str)
        .collect()
}

//! キーワード列のユーティリティ

use std::collections::HashSet;

/// 複数ソースのキーワードを初出順に結合する
///
/// - 重複は文字列として完全一致のもののみ除去（大文字小文字は区別）
/// - 空文字列は除外
/// - `limit` 件で打ち切り
///
/// # Examples
/// ```
/// use phototag_common::merge_keywords;
///
/// let merged = merge_keywords(
///     vec![vec!["лето".to_string(), "день".to_string()], vec!["день".to_string(), "пляж".to_string()]],
///     15,
/// );
/// assert_eq!(merged, vec!["лето", "день", "пляж"]);
/// ```
pub fn merge_keywords<I, K>(sources: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = K>,
    K: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for keyword in sources.into_iter().flatten() {
        if merged.len() >= limit {
            break;
        }
        if keyword.is_empty() || !seen.insert(keyword.clone()) {
            continue;
        }
        merged.push(keyword);
    }

    merged
}

/// 手入力のキーワード（カンマ区切り）を分割する
pub fn parse_keyword_input(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

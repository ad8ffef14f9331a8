//! 固定タグ語彙
//!
//! 表示言語はロシア語。撮影月・時刻からの季節/時間帯タグもここで決める。

/// GPS情報ありを表すタグ
pub const GPS_TAG: &str = "GPS";

/// 撮影月（1-12）から季節タグを決める
pub fn season_tag(month: u32) -> &'static str {
    match month {
        3..=5 => "весна",
        6..=8 => "лето",
        9..=11 => "осень",
        _ => "зима",
    }
}

/// 撮影時刻（0-23）から時間帯タグを決める
pub fn day_part_tag(hour: u32) -> &'static str {
    match hour {
        5..=7 => "рассвет",
        8..=11 => "утро",
        12..=16 => "день",
        17..=19 => "закат",
        _ => "ночь",
    }
}

/// 分類ラベル（英語）→ 表示タグの対応表
const TRANSLATIONS: &[(&str, &str)] = &[
    ("bicycle", "велосипед"),
    ("car", "автомобиль"),
    ("dog", "собака"),
    ("cat", "кот"),
    ("person", "человек"),
    ("building", "здание"),
    ("tree", "дерево"),
    ("flower", "цветок"),
    ("bird", "птица"),
    ("water", "вода"),
    ("sky", "небо"),
    ("mountain", "гора"),
    ("beach", "пляж"),
    ("food", "еда"),
    ("indoor", "интерьер"),
    ("outdoor", "улица"),
];

/// 対応表にあるラベルを翻訳する（大文字小文字は区別しない）
pub fn translate_label(label: &str) -> Option<&'static str> {
    let lower = label.to_lowercase();
    TRANSLATIONS
        .iter()
        .find(|(en, _)| *en == lower)
        .map(|(_, tag)| *tag)
}

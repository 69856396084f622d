// ============================================
// src/schema.rs
// 表記ゆれのある JSON キーを論理フィールドへ解決する
// ============================================

use std::collections::HashMap;

use serde_json::{Map, Number, Value};
use unicode_normalization::UnicodeNormalization;

/// 論理フィールド名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Level,
    Category,
    French,
    Romaji,
    Kana,
    Kanji,
    ExampleFrench,
    ExampleRomaji,
    ExampleKana,
    ExampleJapanese,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Id,
        Field::Level,
        Field::Category,
        Field::French,
        Field::Romaji,
        Field::Kana,
        Field::Kanji,
        Field::ExampleFrench,
        Field::ExampleRomaji,
        Field::ExampleKana,
        Field::ExampleJapanese,
    ];

    /// 既定のキー候補 (先頭から順に試す)
    pub fn default_aliases(self) -> &'static [&'static str] {
        match self {
            Field::Id => &["id", "index", "indice"],
            Field::Level => &["a_savoir", "asavoir", "importance", "prio"],
            Field::French => &["Français", "Francais", "FR", "francais"],
            Field::Romaji => &["Romaji", "Rōmaji", "Roomaji", "romaji"],
            Field::Kana => &["Kana", "かな", "Hiragana", "Katakana", "kana"],
            Field::Kanji => &["Kanji", "漢字", "kanji"],
            Field::Category => &[
                "Catégorie",
                "Categorie",
                "catégorie",
                "categorie",
                "Category",
                "テーマ",
                "theme",
            ],
            Field::ExampleFrench => &["Exemple_FR", "ExempleFr", "ex_fr", "ExFR"],
            Field::ExampleRomaji => &["Exemple_Romaji", "ExempleRomaji", "ex_romaji"],
            Field::ExampleKana => &["Exemple_Kana", "ExempleKana", "ex_kana"],
            Field::ExampleJapanese => &["Exemple_Japonais", "Exemple_JA", "ex_ja", "ExJA", "例文"],
        }
    }
}

/// アクセント記号を落として小文字化する ("Français" -> "francais")
pub fn fold_key(key: &str) -> String {
    key.to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

/// 論理フィールド -> キー候補リスト
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: HashMap<Field, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let aliases = Field::ALL
            .iter()
            .map(|f| {
                let list = f.default_aliases().iter().map(|a| fold_key(a)).collect();
                (*f, list)
            })
            .collect();
        Self { aliases }
    }
}

impl AliasTable {
    /// 候補リストを差し替える
    #[cfg(test)]
    pub fn with_aliases<I, S>(mut self, field: Field, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = aliases.into_iter().map(|a| fold_key(a.as_ref())).collect();
        self.aliases.insert(field, list);
        self
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 最初に見つかった候補の値を返す。見つからなければ None (エラーにはしない)
    pub fn resolve<'a>(&self, record: &'a Record, field: Field) -> Option<&'a Value> {
        self.aliases(field)
            .iter()
            .filter_map(|alias| record.keys.get(alias))
            .find_map(|real| record.fields.get(real))
    }
}

/// JSON の 1 レコードと、正規化キー -> 元キー の対応表
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Map<String, Value>,
    keys: HashMap<String, String>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        // 正規化後に衝突した場合は元データで後に出たキーが勝つ
        let keys = fields
            .keys()
            .map(|k| (fold_key(k), k.clone()))
            .collect();
        Self { fields, keys }
    }
}

/// JSON 値を比較・表示用の文字列にする。null は「未定義」扱い
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// 整数値の浮動小数は小数部を付けない (3.0 -> "3")
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
        Some(f) if n.is_f64() => f.to_string(),
        _ => n.to_string(),
    }
}

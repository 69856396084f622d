// ============================================
// src/dataset.rs
// 語彙データ (JSON 配列) の読み込みと ID 索引
// ============================================

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde_json::Value;

use crate::errors::LoadError;
use crate::schema::{AliasTable, Field, Record, value_text};

/// 単語カード 1 枚分の文字列 (未定義は空文字)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forms {
    pub french: String,
    pub romaji: String,
    pub kana: String,
    pub kanji: String,
}

/// 例文 4 種
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Examples {
    pub french: String,
    pub romaji: String,
    pub kana: String,
    pub japanese: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub forms: Forms,
    pub examples: Examples,
}

/// 読み込み済みの語彙データ
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<Record>,
    by_id: HashMap<String, usize>,
    aliases: AliasTable,
}

impl Dataset {
    /// ファイルから読み込む (読めない / JSON でない / 配列でない はエラー)
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Unreachable {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| LoadError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Array(rows) = value else {
            return Err(LoadError::NotAnArray {
                path: path.to_path_buf(),
            });
        };
        let dataset = Self::from_rows(rows, AliasTable::default());
        info!("loaded {} entries from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// JSON の行から作成し、ID 索引を作る
    pub fn from_rows(rows: Vec<Value>, aliases: AliasTable) -> Self {
        let mut entries = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            match row {
                Value::Object(map) => entries.push(Record::new(map)),
                other => {
                    // オブジェクト以外はフィールドを持たない行として扱う
                    warn!("row {i} is not an object: {other}");
                    entries.push(Record::default());
                }
            }
        }

        let mut dataset = Self {
            entries,
            by_id: HashMap::new(),
            aliases,
        };
        for pos in 0..dataset.entries.len() {
            let id = dataset.entry_id(pos);
            // 重複 ID は後勝ち
            dataset.by_id.insert(id, pos);
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// フィールドの文字列値 (未定義は None)
    pub fn text(&self, pos: usize, field: Field) -> Option<String> {
        let record = self.entries.get(pos)?;
        self.aliases.resolve(record, field).and_then(value_text)
    }

    /// ID が無ければ位置を ID とする
    pub fn entry_id(&self, pos: usize) -> String {
        self.text(pos, Field::Id).unwrap_or_else(|| pos.to_string())
    }

    pub fn position_of_id(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn card(&self, pos: usize) -> Card {
        let get = |field| self.text(pos, field).unwrap_or_default();
        Card {
            id: self.entry_id(pos),
            forms: Forms {
                french: get(Field::French),
                romaji: get(Field::Romaji),
                kana: get(Field::Kana),
                kanji: get(Field::Kanji),
            },
            examples: Examples {
                french: get(Field::ExampleFrench),
                romaji: get(Field::ExampleRomaji),
                kana: get(Field::ExampleKana),
                japanese: get(Field::ExampleJapanese),
            },
        }
    }

    /// 空でない値の一覧 (昇順・重複なし)
    pub fn distinct_values(&self, field: Field) -> Vec<String> {
        let set: BTreeSet<String> = (0..self.len())
            .filter_map(|pos| self.text(pos, field))
            .filter(|v| !v.trim().is_empty())
            .collect();
        set.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_builds_id_index_with_positional_fallback() {
        let file = write_temp(
            r#"[
                {"id": 10, "Français": "chat", "Kana": "ねこ"},
                {"Français": "chien"},
                {"indice": "x7", "Français": "oiseau"}
            ]"#,
        );
        let data = Dataset::load(file.path()).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.position_of_id("10"), Some(0));
        assert_eq!(data.position_of_id("1"), Some(1));
        assert_eq!(data.position_of_id("x7"), Some(2));
        assert_eq!(data.text(0, Field::Kana).as_deref(), Some("ねこ"));
    }

    #[test]
    fn duplicate_ids_last_write_wins() {
        let data = Dataset::from_rows(
            vec![json!({"id": "a"}), json!({"id": "a"}), json!({"id": "b"})],
            AliasTable::default(),
        );
        assert_eq!(data.len(), 3);
        assert_eq!(data.position_of_id("a"), Some(1));
    }

    #[test]
    fn missing_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, LoadError::Unreachable { .. }));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let file = write_temp("{ not json");
        let err = Dataset::load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn object_root_is_rejected() {
        let file = write_temp(r#"{"id": 1}"#);
        let err = Dataset::load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::NotAnArray { .. }));
    }

    #[test]
    fn card_fills_missing_fields_with_empty_strings() {
        let data = Dataset::from_rows(
            vec![json!({"id": 3, "Francais": "chat", "ex_ja": "猫がいる。"})],
            AliasTable::default(),
        );
        let card = data.card(0);
        assert_eq!(card.id, "3");
        assert_eq!(card.forms.french, "chat");
        assert_eq!(card.forms.kanji, "");
        assert_eq!(card.examples.japanese, "猫がいる。");
        assert_eq!(card.examples.romaji, "");
    }

    #[test]
    fn distinct_values_are_sorted_and_skip_blanks() {
        let data = Dataset::from_rows(
            vec![
                json!({"a_savoir": 3}),
                json!({"a_savoir": "1"}),
                json!({"a_savoir": " "}),
                json!({"a_savoir": 3}),
                json!({}),
            ],
            AliasTable::default(),
        );
        assert_eq!(data.distinct_values(Field::Level), vec!["1", "3"]);
    }
}

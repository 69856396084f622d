// ============================================
// src/filters.rs
// 出題モード・レベル・カテゴリの絞り込み
// ============================================

use std::fmt;

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::errors::{Result, VocabError};
use crate::schema::Field;

/// 出題モード (どのフィールドを問題として表示するか)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Mode {
    #[default]
    French,
    Romaji,
    Kana,
    Kanji,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::French, Mode::Romaji, Mode::Kana, Mode::Kanji];

    pub fn prompt_field(self) -> Field {
        match self {
            Mode::French => Field::French,
            Mode::Romaji => Field::Romaji,
            Mode::Kana => Field::Kana,
            Mode::Kanji => Field::Kanji,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::French => "Français",
            Mode::Romaji => "Rōmaji",
            Mode::Kana => "かな",
            Mode::Kanji => "漢字",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// 「すべて」または特定の値
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Choice {
    #[default]
    All,
    Value(String),
}

impl Choice {
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Choice::All => true,
            Choice::Value(wanted) => value == Some(wanted.as_str()),
        }
    }

    /// 選択肢に存在しない値は All に戻す
    pub fn restrict_to(self, options: &[Choice]) -> Self {
        if options.contains(&self) { self } else { Choice::All }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::All => write!(f, "*"),
            Choice::Value(v) => write!(f, "{v}"),
        }
    }
}

/// レベル値の表示名
pub fn level_label(choice: &Choice) -> String {
    match choice {
        Choice::All => "All levels".to_string(),
        Choice::Value(v) => match v.as_str() {
            "1" => "Rare words".to_string(),
            "2" => "Important words".to_string(),
            "3" => "Essential words".to_string(),
            other => format!("Level {other}"),
        },
    }
}

pub fn category_label(choice: &Choice) -> String {
    match choice {
        Choice::All => "All categories".to_string(),
        Choice::Value(v) => v.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    pub mode: Mode,
    pub level: Choice,
    pub category: Choice,
}

/// データから作った選択肢 (先頭は All)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub levels: Vec<Choice>,
    pub categories: Vec<Choice>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let build = |field| {
            std::iter::once(Choice::All)
                .chain(dataset.distinct_values(field).into_iter().map(Choice::Value))
                .collect()
        };
        Self {
            levels: build(Field::Level),
            categories: build(Field::Category),
        }
    }

    /// 保存されていた選択を、現在の選択肢で有効なものに直す
    pub fn sanitize(&self, selection: FilterSelection) -> FilterSelection {
        FilterSelection {
            mode: selection.mode,
            level: selection.level.restrict_to(&self.levels),
            category: selection.category.restrict_to(&self.categories),
        }
    }
}

/// 選択肢を 1 つ進める (末尾の次は先頭)
pub fn cycle(options: &[Choice], current: &Choice) -> Choice {
    if options.is_empty() {
        return Choice::All;
    }
    let idx = options.iter().position(|c| c == current).map_or(0, |i| i + 1);
    options[idx % options.len()].clone()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// 条件に合うデータ位置 (データ順)
    pub filtered: Vec<usize>,
    /// `filtered` 内の開始位置
    pub start: usize,
}

/// 絞り込みを計算し、最後に見た単語が含まれていればそこから始める
pub fn apply_filters(
    dataset: &Dataset,
    selection: &FilterSelection,
    last_viewed: Option<&str>,
) -> Result<FilterOutcome> {
    let filtered: Vec<usize> = (0..dataset.len())
        .filter(|&pos| {
            let level = dataset.text(pos, Field::Level);
            let category = dataset.text(pos, Field::Category);
            selection.level.matches(level.as_deref())
                && selection.category.matches(category.as_deref())
        })
        .collect();

    if filtered.is_empty() {
        return Err(VocabError::EmptySelection);
    }

    let start = last_viewed
        .and_then(|id| dataset.position_of_id(id))
        .and_then(|data_pos| filtered.iter().position(|&p| p == data_pos))
        .unwrap_or(0);

    debug!(
        "filters level={} category={} -> {} entries, start {}",
        selection.level,
        selection.category,
        filtered.len(),
        start
    );
    Ok(FilterOutcome { filtered, start })
}

/// 選択カテゴリ内の単語数と、現在の単語の番号 (1 始まり)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryStats {
    pub count: usize,
    pub position: Option<usize>,
    /// position が絞り込み結果内の番号なら、その件数
    pub of_filtered: Option<usize>,
}

/// レベルを無視してカテゴリだけで数える
pub fn category_stats(
    dataset: &Dataset,
    category: &Choice,
    filtered: &[usize],
    current: Option<usize>,
) -> CategoryStats {
    let in_category: Vec<usize> = (0..dataset.len())
        .filter(|&pos| category.matches(dataset.text(pos, Field::Category).as_deref()))
        .collect();
    let count = in_category.len();

    let Some(data_pos) = current else {
        return CategoryStats { count, position: None, of_filtered: None };
    };
    if let Some(i) = in_category.iter().position(|&p| p == data_pos) {
        return CategoryStats { count, position: Some(i + 1), of_filtered: None };
    }
    let position = filtered.iter().position(|&p| p == data_pos).map(|i| i + 1);
    CategoryStats { count, position, of_filtered: Some(filtered.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AliasTable;
    use serde_json::json;

    fn sample() -> Dataset {
        Dataset::from_rows(
            vec![
                json!({"id": 1, "a_savoir": 3, "Catégorie": "animaux", "Français": "chat"}),
                json!({"id": 2, "a_savoir": 2, "Catégorie": "animaux", "Français": "chien"}),
                json!({"id": 3, "a_savoir": 3, "Catégorie": "maison", "Français": "table"}),
                json!({"id": 4, "a_savoir": "3", "Catégorie": "maison", "Français": "porte"}),
                json!({"id": 5, "Français": "sans niveau"}),
            ],
            AliasTable::default(),
        )
    }

    fn select(level: Choice, category: Choice) -> FilterSelection {
        FilterSelection { mode: Mode::Kana, level, category }
    }

    #[test]
    fn all_selects_everything() {
        let data = sample();
        let out = apply_filters(&data, &FilterSelection::default(), None).unwrap();
        assert_eq!(out.filtered, vec![0, 1, 2, 3, 4]);
        assert_eq!(out.start, 0);
    }

    #[test]
    fn level_comparison_is_string_based() {
        let data = sample();
        let sel = select(Choice::Value("3".into()), Choice::All);
        let out = apply_filters(&data, &sel, None).unwrap();
        // 数値の 3 と文字列の "3" は同じ扱い
        assert_eq!(out.filtered, vec![0, 2, 3]);
    }

    #[test]
    fn level_and_category_combine() {
        let data = sample();
        let sel = select(Choice::Value("3".into()), Choice::Value("maison".into()));
        let out = apply_filters(&data, &sel, None).unwrap();
        assert_eq!(out.filtered, vec![2, 3]);
    }

    #[test]
    fn empty_selection_is_signalled() {
        let data = sample();
        let sel = select(Choice::Value("9".into()), Choice::All);
        let err = apply_filters(&data, &sel, None).unwrap_err();
        assert!(matches!(err, VocabError::EmptySelection));
    }

    #[test]
    fn start_restores_last_viewed_when_in_scope() {
        let data = sample();
        let sel = select(Choice::Value("3".into()), Choice::All);
        let out = apply_filters(&data, &sel, Some("4")).unwrap();
        assert_eq!(out.start, 2);

        // 範囲外の ID は先頭に戻る
        let out = apply_filters(&data, &sel, Some("2")).unwrap();
        assert_eq!(out.start, 0);
        let out = apply_filters(&data, &sel, Some("unknown")).unwrap();
        assert_eq!(out.start, 0);
    }

    #[test]
    fn options_and_sanitize() {
        let data = sample();
        let options = FilterOptions::from_dataset(&data);
        assert_eq!(
            options.levels,
            vec![Choice::All, Choice::Value("2".into()), Choice::Value("3".into())]
        );
        assert_eq!(
            options.categories,
            vec![Choice::All, Choice::Value("animaux".into()), Choice::Value("maison".into())]
        );

        let stale = select(Choice::Value("7".into()), Choice::Value("maison".into()));
        let fixed = options.sanitize(stale);
        assert_eq!(fixed.level, Choice::All);
        assert_eq!(fixed.category, Choice::Value("maison".into()));
    }

    #[test]
    fn cycle_wraps_around() {
        let options = vec![Choice::All, Choice::Value("a".into()), Choice::Value("b".into())];
        assert_eq!(cycle(&options, &Choice::All), Choice::Value("a".into()));
        assert_eq!(cycle(&options, &Choice::Value("b".into())), Choice::All);
        assert_eq!(cycle(&options, &Choice::Value("zz".into())), Choice::All);
        assert_eq!(Mode::Kanji.next(), Mode::French);
    }

    #[test]
    fn labels() {
        assert_eq!(level_label(&Choice::Value("1".into())), "Rare words");
        assert_eq!(level_label(&Choice::Value("5".into())), "Level 5");
        assert_eq!(level_label(&Choice::All), "All levels");
        assert_eq!(category_label(&Choice::All), "All categories");
    }

    #[test]
    fn stats_count_category_ignoring_level() {
        let data = sample();
        let category = Choice::Value("maison".into());
        let filtered = vec![2, 3];
        let stats = category_stats(&data, &category, &filtered, Some(3));
        assert_eq!(stats, CategoryStats { count: 2, position: Some(2), of_filtered: None });

        let all = category_stats(&data, &Choice::All, &[0, 1, 2, 3, 4], None);
        assert_eq!(all.count, 5);
        assert_eq!(all.position, None);
    }
}

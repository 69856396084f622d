// ============================================
// src/verify.rs
// 解答チェック (モードごとのゆるい比較)
// ============================================

use crate::dataset::{Card, Examples, Forms};
use crate::filters::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Correct,
    Incorrect,
    /// 未入力 (答えの表示だけ行う)
    NoAnswer,
}

/// 判定結果。参照用の 4 表記と例文 4 種は常に含む
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub status: Status,
    pub reference: Forms,
    pub examples: Examples,
}

/// 小文字化・前後の空白除去・連続空白を 1 つにまとめる
pub fn normalize_spaces(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn verify(mode: Mode, input: &str, card: &Card) -> Verification {
    let forms = &card.forms;
    let answer = input.trim();

    let status = if answer.is_empty() {
        Status::NoAnswer
    } else {
        let ok = match mode {
            // フランス語が表示されているときはローマ字で答える
            Mode::French => normalize_spaces(input) == normalize_spaces(&forms.romaji),
            // ローマ字が表示されているときはフランス語で答える
            Mode::Romaji => normalize_spaces(input) == normalize_spaces(&forms.french),
            Mode::Kana => answer == forms.french || answer == forms.kana || answer == forms.kanji,
            Mode::Kanji => answer == forms.french || answer == forms.kanji || answer == forms.kana,
        };
        if ok { Status::Correct } else { Status::Incorrect }
    };

    Verification {
        status,
        reference: forms.clone(),
        examples: card.examples.clone(),
    }
}

// ============================================
// src/voice.rs
// 日本語音声の女性 / 男性の振り分け
// ============================================

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 合成エンジンが持つ音声 1 つ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// 言語タグ ("ja-JP", "ja_JP", "ja" など)
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    pub fn is_japanese(&self) -> bool {
        let lang = self.lang.to_lowercase();
        lang.starts_with("ja") || lang.contains("ja-jp")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Female,
    Male,
}

impl Gender {
    pub fn toggle(self) -> Self {
        match self {
            Gender::Female => Gender::Male,
            Gender::Male => Gender::Female,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Female => write!(f, "female"),
            Gender::Male => write!(f, "male"),
        }
    }
}

/// 振り分け結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCandidates {
    pub japanese: Vec<Voice>,
    pub female: Option<String>,
    pub male: Option<String>,
}

impl VoiceCandidates {
    pub fn has_japanese(&self) -> bool {
        !self.japanese.is_empty()
    }

    /// 性別の設定に合う音声名。日本語音声が無ければ None
    pub fn select(&self, gender: Gender) -> Option<&str> {
        match gender {
            Gender::Female => self.female.as_deref(),
            Gender::Male => self.male.as_deref(),
        }
    }
}

/// 差し替え可能な振り分けルール
pub trait VoiceClassifier {
    fn classify(&self, available: &[Voice]) -> VoiceCandidates;
}

/// 名前のパターンで判定する
pub struct NamePatternClassifier {
    female: Regex,
    male: Regex,
}

impl NamePatternClassifier {
    pub fn new(female: Regex, male: Regex) -> Self {
        Self { female, male }
    }
}

impl Default for NamePatternClassifier {
    fn default() -> Self {
        // 固定パターンなのでコンパイルは失敗しない
        let female = Regex::new(
            r"(?i)(kyoko|mizuki|nanami|sayaka|haruka|kana|yui|aoi|sakura|female|woman|女|女性)",
        )
        .expect("female voice pattern");
        let male = Regex::new(
            r"(?i)(takashi|hiroshi|yuki|kenta|jiro|male|man|otoko|kazu|masa|男|男性)",
        )
        .expect("male voice pattern");
        Self::new(female, male)
    }
}

impl VoiceClassifier for NamePatternClassifier {
    fn classify(&self, available: &[Voice]) -> VoiceCandidates {
        let japanese: Vec<Voice> = available.iter().filter(|v| v.is_japanese()).cloned().collect();

        let female = japanese
            .iter()
            .find(|v| self.female.is_match(&v.name))
            .or_else(|| japanese.first())
            .map(|v| v.name.clone());
        let male = japanese
            .iter()
            .find(|v| self.male.is_match(&v.name))
            .or_else(|| japanese.get(1))
            .map(|v| v.name.clone())
            .or_else(|| female.clone());

        VoiceCandidates { japanese, female, male }
    }
}

pub fn classify_voices(available: &[Voice]) -> VoiceCandidates {
    NamePatternClassifier::default().classify(available)
}

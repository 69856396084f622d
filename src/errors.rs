// ============================================
// src/errors.rs
// エラー型
// ============================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// データファイル (JSON) の読み込み失敗
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Unreachable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected JSON format in {path} (an array is required)")]
    NotAnArray { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum VocabError {
    #[error("could not load the vocabulary: {0}")]
    Load(#[from] LoadError),

    #[error("no entry matches the selected filters")]
    EmptySelection,

    // ローマ字しかない例文の場合はメッセージを変える
    #[error("{}", audio_unavailable_message(.romaji_only))]
    AudioUnavailable { romaji_only: bool },

    #[error("nothing to pronounce for this entry")]
    NothingToSpeak,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("save data error: {0}")]
    Save(String),
}

fn audio_unavailable_message(romaji_only: &bool) -> &'static str {
    if *romaji_only {
        "the sentence is in romaji: no Japanese voice is available and no fallback audio was found"
    } else {
        "no Japanese voice detected and no fallback audio found"
    }
}

pub type Result<T> = std::result::Result<T, VocabError>;

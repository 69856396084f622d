// ============================================
// src/save_data.rs
// 設定 (最後の出題モード・絞り込み・音声・単語) の保存と読み込み
// ============================================

use bincode::config::standard;
use bincode::{Decode, Encode};
use chrono::{DateTime, TimeZone, Utc};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use crate::errors::{Result, VocabError};
use crate::filters::{Choice, FilterSelection, Mode};
use crate::voice::Gender;

const SAVE_FILE_BIN: &str = "preferences.bin";
const SAVE_FILE_JSON: &str = "preferences.json"; // デバッグ用

/// 再起動しても残る状態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub mode: Mode,
    pub level: Choice,
    pub category: Choice,
    pub voice_gender: Gender,
    /// 最後に表示した単語の ID
    pub last_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            level: Choice::All,
            category: Choice::All,
            voice_gender: Gender::Female,
            last_id: None,
            updated_at: None,
        }
    }
}

impl Preferences {
    pub fn selection(&self) -> FilterSelection {
        FilterSelection {
            mode: self.mode,
            level: self.level.clone(),
            category: self.category.clone(),
        }
    }

    pub fn set_selection(&mut self, selection: &FilterSelection) {
        self.mode = selection.mode;
        self.level = selection.level.clone();
        self.category = selection.category.clone();
    }
}

/// bincode用の内部表現 (列挙型は数値、日時は i64)
#[derive(Encode, Decode)]
struct PreferencesBin {
    mode: u8,
    level: Option<String>,
    category: Option<String>,
    voice_male: bool,
    last_id: Option<String>,
    updated_at_secs: Option<i64>,
}

fn choice_to_bin(choice: &Choice) -> Option<String> {
    match choice {
        Choice::All => None,
        Choice::Value(v) => Some(v.clone()),
    }
}

fn choice_from_bin(value: Option<String>) -> Choice {
    value.map_or(Choice::All, Choice::Value)
}

impl From<&Preferences> for PreferencesBin {
    fn from(prefs: &Preferences) -> Self {
        Self {
            mode: match prefs.mode {
                Mode::French => 0,
                Mode::Romaji => 1,
                Mode::Kana => 2,
                Mode::Kanji => 3,
            },
            level: choice_to_bin(&prefs.level),
            category: choice_to_bin(&prefs.category),
            voice_male: prefs.voice_gender == Gender::Male,
            last_id: prefs.last_id.clone(),
            updated_at_secs: prefs.updated_at.map(|t| t.timestamp()),
        }
    }
}

impl From<PreferencesBin> for Preferences {
    fn from(bin: PreferencesBin) -> Self {
        Self {
            mode: match bin.mode {
                1 => Mode::Romaji,
                2 => Mode::Kana,
                3 => Mode::Kanji,
                _ => Mode::French,
            },
            level: choice_from_bin(bin.level),
            category: choice_from_bin(bin.category),
            voice_gender: if bin.voice_male { Gender::Male } else { Gender::Female },
            last_id: bin.last_id,
            updated_at: bin
                .updated_at_secs
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        }
    }
}

// MARK:保存先のディレクトリを取得する関数
pub fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("fr", "vockit", "VOC_KIT") {
        return proj_dirs.data_dir().to_path_buf();
    }
    // 取得できなかったらカレントディレクトリに（フォールバック）
    PathBuf::from(".")
}

/// 設定の保存先。`dir` が無ければメモリ上だけで保持する
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    dir: Option<PathBuf>,
}

impl PreferenceStore {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self { dir: None }
    }

    #[cfg(test)]
    pub fn dir(&self) -> Option<&std::path::Path> {
        self.dir.as_deref()
    }

    /// MARK:データをファイルに保存する (バイナリ + JSON)
    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        // ディレクトリがまだなければ作成する
        fs::create_dir_all(dir)?;

        // --- 1. バイナリ形式で保存 (本番用) ---
        let bin_data = PreferencesBin::from(prefs);
        let encoded = bincode::encode_to_vec(&bin_data, standard())
            .map_err(|e| VocabError::Save(e.to_string()))?;
        let file = File::create(dir.join(SAVE_FILE_BIN))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&encoded)?;
        writer.flush()?;

        // --- 2. JSON形式で保存 (デバッグ用) ---
        let json =
            serde_json::to_string_pretty(prefs).map_err(|e| VocabError::Save(e.to_string()))?;
        fs::write(dir.join(SAVE_FILE_JSON), json)?;

        debug!("preferences saved to {}", dir.display());
        Ok(())
    }

    /// MARK:ファイルからデータを読み込む (バイナリ優先、JSONフォールバック)
    pub fn load(&self) -> Preferences {
        let Some(dir) = &self.dir else {
            return Preferences::default();
        };

        // 1. バイナリファイルから読み込みを試行
        let bin_path = dir.join(SAVE_FILE_BIN);
        if bin_path.exists() {
            if let Ok(mut file) = File::open(&bin_path) {
                let mut buffer = Vec::new();
                if file.read_to_end(&mut buffer).is_ok() {
                    match bincode::decode_from_slice::<PreferencesBin, _>(&buffer, standard()) {
                        Ok((bin_data, _)) => return Preferences::from(bin_data),
                        Err(e) => warn!("corrupted {}: {e}", bin_path.display()),
                    }
                }
            }
        }

        // 2. バイナリ失敗時、JSONファイルから読み込みを試行
        let json_path = dir.join(SAVE_FILE_JSON);
        if json_path.exists() {
            if let Ok(file) = File::open(&json_path) {
                let reader = BufReader::new(file);
                if let Ok(data) = serde_json::from_reader(reader) {
                    return data;
                }
            }
        }

        // どちらも失敗した場合はデフォルト
        Preferences::default()
    }

    /// 保存ファイルを削除する
    pub fn reset(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        for name in [SAVE_FILE_BIN, SAVE_FILE_JSON] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

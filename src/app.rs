// ============================================
// src/app.rs
// アプリ全体の状態と、ユーザー操作ごとの状態遷移
// ============================================

use std::path::PathBuf;

use chrono::Utc;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::audio::{Pronouncer, Spoken};
use crate::dataset::{Card, Dataset};
use crate::errors::VocabError;
use crate::filters::{
    self, CategoryStats, Choice, FilterOptions, FilterSelection, Mode, category_stats,
};
use crate::navigation::Cursor;
use crate::phrases::{PhraseBook, PhraseCursor, PhraseLine};
use crate::save_data::{PreferenceStore, Preferences};
use crate::verify::{Status, Verification, verify};
use crate::voice::Gender;

/// 値が無いときの表示
pub const PLACEHOLDER: &str = "—";

/// 画面の上に重ねて表示するもの
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Help,
    Phrases,
}

/// このセッションの正解数・不正解数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionScore {
    pub correct: u32,
    pub incorrect: u32,
}

/// アプリ全体の状態を管理する
pub struct AppState {
    dataset: Dataset,
    options: FilterOptions,
    selection: FilterSelection,
    cursor: Cursor,

    prefs: Preferences,
    store: PreferenceStore,

    pronouncer: Pronouncer,
    rng: StdRng,

    /// 入力中の答え
    pub answer: String,
    /// 直前の答え合わせ (単語が変わると消える)
    pub verification: Option<Verification>,
    /// 閉じられるお知らせ (エラーなど)
    pub notice: Option<String>,
    pub overlay: Overlay,
    pub score: SessionScore,

    phrases_path: PathBuf,
    phrase_book: Option<PhraseBook>,
    phrase_cursor: Option<PhraseCursor>,
}

impl AppState {
    /// AppState の初期化 (保存された設定を読み込み、絞り込みまで行う)
    pub fn new(
        dataset: Dataset,
        store: PreferenceStore,
        pronouncer: Pronouncer,
        phrases_path: PathBuf,
        mode_override: Option<Mode>,
    ) -> Self {
        let prefs = store.load();
        let options = FilterOptions::from_dataset(&dataset);
        let mut selection = options.sanitize(prefs.selection());
        if let Some(mode) = mode_override {
            selection.mode = mode;
        }

        let mut state = Self {
            dataset,
            options,
            selection,
            cursor: Cursor::empty(),
            prefs,
            store,
            pronouncer,
            rng: StdRng::from_os_rng(),
            answer: String::new(),
            verification: None,
            notice: None,
            overlay: Overlay::None,
            score: SessionScore::default(),
            phrases_path,
            phrase_book: None,
            phrase_cursor: None,
        };
        state.pronouncer.refresh_voices();
        state.apply_filters();
        state
    }

    /// 乱数を固定する (テスト用)
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    // --------------------------------------------------
    // 読み取り
    // --------------------------------------------------

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    #[cfg(test)]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    #[cfg(test)]
    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn current_card(&self) -> Option<Card> {
        self.cursor.current().map(|pos| self.dataset.card(pos))
    }

    /// 出題モードに応じた問題文
    pub fn prompt_text(&self) -> Option<String> {
        let pos = self.cursor.current()?;
        let text = self
            .dataset
            .text(pos, self.selection.mode.prompt_field())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| PLACEHOLDER.to_string());
        Some(text)
    }

    pub fn stats(&self) -> CategoryStats {
        category_stats(
            &self.dataset,
            &self.selection.category,
            self.cursor.filtered(),
            self.cursor.current(),
        )
    }

    pub fn voice_gender(&self) -> Gender {
        self.prefs.voice_gender
    }

    pub fn has_japanese_voice(&self) -> bool {
        self.pronouncer.candidates().has_japanese()
    }

    // --------------------------------------------------
    // 絞り込み
    // --------------------------------------------------

    /// 選択を保存してから絞り込み直す
    pub fn apply_filters(&mut self) {
        self.prefs.set_selection(&self.selection);
        self.persist();

        let last_id = self.prefs.last_id.clone();
        match filters::apply_filters(&self.dataset, &self.selection, last_id.as_deref()) {
            Ok(outcome) => {
                self.notice = None;
                self.cursor = Cursor::new(outcome.filtered, outcome.start);
                self.show_current();
            }
            Err(e) => {
                warn!("{e}");
                self.cursor = Cursor::empty();
                self.reset_answer();
                self.notice = Some(e.to_string());
            }
        }
    }

    /// モードだけ変える (絞り込み結果はそのまま)
    pub fn set_mode(&mut self, mode: Mode) {
        self.selection.mode = mode;
        self.prefs.mode = mode;
        self.persist();
        self.show_current();
    }

    pub fn cycle_mode(&mut self) {
        self.set_mode(self.selection.mode.next());
    }

    pub fn set_level(&mut self, level: Choice) {
        self.selection.level = level;
        self.apply_filters();
    }

    pub fn set_category(&mut self, category: Choice) {
        self.selection.category = category;
        self.apply_filters();
    }

    pub fn cycle_level(&mut self) {
        let next = filters::cycle(&self.options.levels, &self.selection.level);
        self.set_level(next);
    }

    pub fn cycle_category(&mut self) {
        let next = filters::cycle(&self.options.categories, &self.selection.category);
        self.set_category(next);
    }

    // --------------------------------------------------
    // 移動
    // --------------------------------------------------

    pub fn next(&mut self) {
        if self.cursor.next().is_some() {
            self.show_current();
        }
    }

    pub fn previous(&mut self) {
        if self.cursor.previous().is_some() {
            self.show_current();
        }
    }

    pub fn random(&mut self) {
        if self.cursor.random_jump(&mut self.rng).is_some() {
            self.show_current();
        }
    }

    /// 現在の単語を表示し直す: 入力と結果を消し、最後に見た ID を保存
    fn show_current(&mut self) {
        self.reset_answer();
        let Some(pos) = self.cursor.current() else {
            return;
        };
        self.prefs.last_id = Some(self.dataset.entry_id(pos));
        self.persist();
    }

    fn reset_answer(&mut self) {
        self.answer.clear();
        self.verification = None;
    }

    // --------------------------------------------------
    // 答え合わせ
    // --------------------------------------------------

    pub fn push_char(&mut self, c: char) {
        self.answer.push(c);
    }

    pub fn backspace(&mut self) {
        self.answer.pop();
    }

    pub fn verify(&mut self) -> Option<Status> {
        let card = self.current_card()?;
        let result = verify(self.selection.mode, &self.answer, &card);
        match result.status {
            Status::Correct => self.score.correct += 1,
            Status::Incorrect => self.score.incorrect += 1,
            Status::NoAnswer => {}
        }
        info!("verify id={} mode={:?} -> {:?}", card.id, self.selection.mode, result.status);
        let status = result.status;
        self.verification = Some(result);
        Some(status)
    }

    // --------------------------------------------------
    // 音声
    // --------------------------------------------------

    pub fn toggle_voice(&mut self) {
        self.prefs.voice_gender = self.prefs.voice_gender.toggle();
        self.persist();
    }

    pub fn speak_word(&mut self) {
        let Some(card) = self.current_card() else {
            return;
        };
        let result = self.pronouncer.pronounce_word(&card, self.prefs.voice_gender);
        self.report_audio(result);
    }

    pub fn speak_example(&mut self) {
        let Some(card) = self.current_card() else {
            return;
        };
        let result = self.pronouncer.pronounce_example(&card, self.prefs.voice_gender);
        self.report_audio(result);
    }

    pub fn preview_voice(&mut self) {
        let result = self.pronouncer.preview(self.prefs.voice_gender);
        self.report_audio(result);
    }

    fn report_audio(&mut self, result: Result<Spoken, VocabError>) {
        match result {
            Ok(Spoken::Synthesized) => {}
            Ok(Spoken::Fallback(path)) => info!("played {}", path.display()),
            Err(e) => {
                warn!("{e}");
                self.notice = Some(e.to_string());
            }
        }
    }

    pub fn stop_audio(&mut self) {
        self.pronouncer.stop();
    }

    // --------------------------------------------------
    // 会話文
    // --------------------------------------------------

    /// 初回だけ読み込み、最初のレッスンを開く
    pub fn open_phrases(&mut self) {
        if self.phrase_book.is_none() {
            match PhraseBook::load(&self.phrases_path) {
                Ok(book) => self.phrase_book = Some(book),
                Err(e) => {
                    warn!("{e}");
                    self.notice = Some(format!("could not load the dialogue lines: {e}"));
                    return;
                }
            }
        }
        let Some(book) = &self.phrase_book else {
            return;
        };
        match PhraseCursor::open(book) {
            Some(cursor) => {
                self.phrase_cursor = Some(cursor);
                self.overlay = Overlay::Phrases;
            }
            None => {
                self.notice = Some(format!(
                    "no lesson found in {}",
                    self.phrases_path.display()
                ));
            }
        }
    }

    pub fn phrase_view(&self) -> Option<(&PhraseBook, &PhraseCursor)> {
        Some((self.phrase_book.as_ref()?, self.phrase_cursor.as_ref()?))
    }

    pub fn current_phrase(&self) -> Option<&PhraseLine> {
        let (book, cursor) = self.phrase_view()?;
        cursor.current(book)
    }

    fn with_phrases(&mut self, f: impl FnOnce(&mut PhraseCursor, &PhraseBook)) {
        if let (Some(book), Some(cursor)) = (&self.phrase_book, &mut self.phrase_cursor) {
            f(cursor, book);
        }
    }

    pub fn next_phrase(&mut self) {
        self.with_phrases(|c, b| c.next(b));
    }

    pub fn previous_phrase(&mut self) {
        self.with_phrases(|c, b| c.previous(b));
    }

    pub fn next_lesson(&mut self) {
        self.with_phrases(|c, b| c.next_lesson(b));
    }

    pub fn previous_lesson(&mut self) {
        self.with_phrases(|c, b| c.previous_lesson(b));
    }

    pub fn speak_phrase(&mut self) {
        let text = self
            .current_phrase()
            .and_then(|line| line.japanese.clone())
            .unwrap_or_default();
        if text.is_empty() {
            self.notice = Some("no Japanese text on this line".to_string());
            return;
        }
        if !self.pronouncer.speak_japanese(&text, self.prefs.voice_gender) {
            self.notice = Some("Japanese voice unavailable".to_string());
        }
    }

    // --------------------------------------------------
    // 保存
    // --------------------------------------------------

    fn persist(&mut self) {
        self.prefs.updated_at = Some(Utc::now());
        if let Err(e) = self.store.save(&self.prefs) {
            // 保存できなくても学習は続けられる
            warn!("could not save preferences: {e}");
        }
    }
}

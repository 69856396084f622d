// ============================================
// src/audio.rs
// 単語・例文の読み上げ (音声合成 -> 録音済み MP3 の順に試す)
// ============================================

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::Card;
use crate::errors::{Result, VocabError};
use crate::speech::SpeechEngine;
use crate::voice::{Gender, VoiceCandidates, VoiceClassifier};

/// 音声のお試し用の文
pub const PREVIEW_TEXT: &str = "こんにちは";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Word,
    Example,
}

/// `<dir>/word_<id>.mp3` または `<dir>/example_<id>.mp3`
pub fn fallback_path(dir: &Path, id: &str, kind: AudioKind) -> PathBuf {
    let name = match kind {
        AudioKind::Word => format!("word_{id}.mp3"),
        AudioKind::Example => format!("example_{id}.mp3"),
    };
    dir.join(name)
}

/// 録音済み音声の再生
pub trait AudioPlayer {
    fn exists(&self, path: &Path) -> bool;
    fn play(&mut self, path: &Path) -> io::Result<()>;
}

/// 外部コマンドで MP3 を再生する
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandPlayer {
    pub fn system() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", &[])
        } else {
            Self::new("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"])
        }
    }

    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            child: None,
        }
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl AudioPlayer for CommandPlayer {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn play(&mut self, path: &Path) -> io::Result<()> {
        self.stop();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// どの手段で鳴らしたか
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spoken {
    Synthesized,
    Fallback(PathBuf),
}

static JAPANESE_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x{3040}-\x{30ff}\x{4e00}-\x{9faf}]+(?:[\x{3040}-\x{30ff}\x{4e00}-\x{9faf}\s、。！？]+)*",
    )
    .unwrap()
});

/// 例文から読み上げる部分を取り出す。(文, ローマ字のみか)
pub fn example_speech_text(card: &Card) -> Option<(String, bool)> {
    let ex = &card.examples;
    let mut text = if !ex.kana.is_empty() {
        ex.kana.trim().to_string()
    } else {
        ex.japanese.trim().to_string()
    };
    let mut romaji_only = false;
    if text.is_empty() && !ex.romaji.trim().is_empty() {
        text = ex.romaji.trim().to_string();
        romaji_only = true;
    }
    if text.is_empty() {
        return None;
    }

    // ラベルや複数行が混ざっていても日本語の部分だけを読む
    if let Some(m) = JAPANESE_RUN.find(&text) {
        return Some((m.as_str().trim().to_string(), false));
    }
    let first_line = text.lines().next().unwrap_or_default().trim().to_string();
    if first_line.is_empty() {
        None
    } else {
        Some((first_line, romaji_only))
    }
}

/// 単語の読み上げ文 (かな -> 漢字 -> ローマ字)
pub fn word_speech_text(card: &Card) -> &str {
    let f = &card.forms;
    [&f.kana, &f.kanji, &f.romaji]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(String::as_str)
        .unwrap_or_default()
}

/// 音声合成と録音済み音声をまとめて扱う
pub struct Pronouncer {
    speech: Box<dyn SpeechEngine>,
    player: Box<dyn AudioPlayer>,
    classifier: Box<dyn VoiceClassifier>,
    audio_dir: PathBuf,
    candidates: VoiceCandidates,
}

impl Pronouncer {
    pub fn new(
        speech: Box<dyn SpeechEngine>,
        player: Box<dyn AudioPlayer>,
        classifier: Box<dyn VoiceClassifier>,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            speech,
            player,
            classifier,
            audio_dir,
            candidates: VoiceCandidates::default(),
        }
    }

    /// 音声一覧を取り直して振り分ける
    pub fn refresh_voices(&mut self) -> &VoiceCandidates {
        let voices = self.speech.voices();
        self.candidates = self.classifier.classify(&voices);
        info!(
            "{} Japanese voice(s): female={:?} male={:?}",
            self.candidates.japanese.len(),
            self.candidates.female,
            self.candidates.male
        );
        &self.candidates
    }

    pub fn candidates(&self) -> &VoiceCandidates {
        &self.candidates
    }

    /// 日本語音声で話す。話せなかったら false
    pub fn speak_japanese(&mut self, text: &str, gender: Gender) -> bool {
        if text.is_empty() || !self.candidates.has_japanese() {
            return false;
        }
        let voice = self
            .candidates
            .select(gender)
            .or_else(|| self.candidates.japanese.first().map(|v| v.name.as_str()))
            .map(str::to_string);
        match self.speech.speak(text, voice.as_deref()) {
            Ok(()) => true,
            Err(e) => {
                warn!("speech synthesis failed: {e}");
                false
            }
        }
    }

    fn play_fallback(&mut self, id: &str, kind: AudioKind) -> Option<PathBuf> {
        let path = fallback_path(&self.audio_dir, id, kind);
        if !self.player.exists(&path) {
            debug!("no fallback audio at {}", path.display());
            return None;
        }
        match self.player.play(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("could not play {}: {e}", path.display());
                None
            }
        }
    }

    pub fn pronounce_word(&mut self, card: &Card, gender: Gender) -> Result<Spoken> {
        let text = word_speech_text(card).to_string();
        if self.speak_japanese(&text, gender) {
            return Ok(Spoken::Synthesized);
        }
        self.play_fallback(&card.id, AudioKind::Word)
            .map(Spoken::Fallback)
            .ok_or(VocabError::AudioUnavailable { romaji_only: false })
    }

    pub fn pronounce_example(&mut self, card: &Card, gender: Gender) -> Result<Spoken> {
        self.speech.cancel();
        let (text, romaji_only) = example_speech_text(card).ok_or(VocabError::NothingToSpeak)?;
        if self.speak_japanese(&text, gender) {
            return Ok(Spoken::Synthesized);
        }
        self.play_fallback(&card.id, AudioKind::Example)
            .map(Spoken::Fallback)
            .ok_or(VocabError::AudioUnavailable { romaji_only })
    }

    /// 選択中の音声でお試し再生 (録音済み音声は使わない)
    pub fn preview(&mut self, gender: Gender) -> Result<Spoken> {
        if self.speak_japanese(PREVIEW_TEXT, gender) {
            Ok(Spoken::Synthesized)
        } else {
            Err(VocabError::AudioUnavailable { romaji_only: false })
        }
    }

    pub fn stop(&mut self) {
        self.speech.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Examples, Forms};
    use crate::voice::{NamePatternClassifier, Voice};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        spoken: Vec<(String, Option<String>)>,
        cancels: usize,
        played: Vec<PathBuf>,
    }

    struct FakeSpeech {
        voices: Vec<Voice>,
        log: Rc<RefCell<Log>>,
    }

    impl SpeechEngine for FakeSpeech {
        fn voices(&mut self) -> Vec<Voice> {
            self.voices.clone()
        }

        fn speak(&mut self, text: &str, voice: Option<&str>) -> io::Result<()> {
            self.log
                .borrow_mut()
                .spoken
                .push((text.to_string(), voice.map(str::to_string)));
            Ok(())
        }

        fn cancel(&mut self) {
            self.log.borrow_mut().cancels += 1;
        }
    }

    struct FakePlayer {
        files: HashSet<PathBuf>,
        log: Rc<RefCell<Log>>,
    }

    impl AudioPlayer for FakePlayer {
        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        fn play(&mut self, path: &Path) -> io::Result<()> {
            self.log.borrow_mut().played.push(path.to_path_buf());
            Ok(())
        }
    }

    fn pronouncer(voices: Vec<Voice>, files: &[&str]) -> (Pronouncer, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let speech = FakeSpeech { voices, log: Rc::clone(&log) };
        let player = FakePlayer {
            files: files.iter().map(PathBuf::from).collect(),
            log: Rc::clone(&log),
        };
        let mut p = Pronouncer::new(
            Box::new(speech),
            Box::new(player),
            Box::new(NamePatternClassifier::default()),
            PathBuf::from("audio"),
        );
        p.refresh_voices();
        (p, log)
    }

    fn card(kana: &str, kanji: &str, romaji: &str, examples: Examples) -> Card {
        Card {
            id: "12".into(),
            forms: Forms {
                french: "chat".into(),
                romaji: romaji.into(),
                kana: kana.into(),
                kanji: kanji.into(),
            },
            examples,
        }
    }

    #[test]
    fn fallback_paths_follow_convention() {
        let dir = Path::new("audio");
        assert_eq!(fallback_path(dir, "7", AudioKind::Word), PathBuf::from("audio/word_7.mp3"));
        assert_eq!(
            fallback_path(dir, "7", AudioKind::Example),
            PathBuf::from("audio/example_7.mp3")
        );
    }

    #[test]
    fn word_text_prefers_kana_then_kanji_then_romaji() {
        assert_eq!(word_speech_text(&card("ねこ", "猫", "neko", Examples::default())), "ねこ");
        assert_eq!(word_speech_text(&card("", "猫", "neko", Examples::default())), "猫");
        assert_eq!(word_speech_text(&card("", "", "neko", Examples::default())), "neko");
        assert_eq!(word_speech_text(&card("", "", "", Examples::default())), "");
    }

    #[test]
    fn example_text_extracts_japanese_run() {
        let ex = Examples {
            japanese: "Exemple : 猫が好きです。\nJ'aime les chats.".into(),
            ..Examples::default()
        };
        let (text, romaji) = example_speech_text(&card("", "", "", ex)).unwrap();
        assert_eq!(text, "猫が好きです。");
        assert!(!romaji);
    }

    #[test]
    fn example_text_falls_back_to_romaji_first_line() {
        let ex = Examples {
            romaji: "neko ga suki desu\nsecond line".into(),
            ..Examples::default()
        };
        let (text, romaji) = example_speech_text(&card("", "", "", ex)).unwrap();
        assert_eq!(text, "neko ga suki desu");
        assert!(romaji);
        assert_eq!(example_speech_text(&card("", "", "", Examples::default())), None);
    }

    #[test]
    fn synthesis_uses_selected_voice() {
        let voices = vec![Voice::new("Kyoko", "ja-JP"), Voice::new("Otoya", "ja-JP")];
        let (mut p, log) = pronouncer(voices, &[]);
        let c = card("ねこ", "猫", "neko", Examples::default());
        assert_eq!(p.pronounce_word(&c, Gender::Male).unwrap(), Spoken::Synthesized);
        assert_eq!(
            log.borrow().spoken,
            vec![("ねこ".to_string(), Some("Otoya".to_string()))]
        );
    }

    #[test]
    fn example_and_stop_cancel_current_speech() {
        let (mut p, log) = pronouncer(vec![Voice::new("Kyoko", "ja-JP")], &[]);
        let ex = Examples { kana: "ねこがいる。".into(), ..Examples::default() };
        let c = card("ねこ", "猫", "neko", ex);
        assert_eq!(log.borrow().cancels, 0);
        p.pronounce_example(&c, Gender::Female).unwrap();
        assert_eq!(log.borrow().cancels, 1);
        p.stop();
        assert_eq!(log.borrow().cancels, 2);
    }

    #[test]
    fn custom_classifier_picks_the_voice() {
        let log = Rc::new(RefCell::new(Log::default()));
        let speech = FakeSpeech {
            voices: vec![Voice::new("Kyoko", "ja-JP"), Voice::new("Otoya", "ja-JP")],
            log: Rc::clone(&log),
        };
        let player = FakePlayer { files: HashSet::new(), log: Rc::clone(&log) };
        let classifier = NamePatternClassifier::new(
            Regex::new("(?i)otoya").unwrap(),
            Regex::new("(?i)kyoko").unwrap(),
        );
        let mut p = Pronouncer::new(
            Box::new(speech),
            Box::new(player),
            Box::new(classifier),
            PathBuf::from("audio"),
        );
        p.refresh_voices();
        assert!(p.speak_japanese("はい", Gender::Female));
        assert_eq!(log.borrow().spoken[0].1.as_deref(), Some("Otoya"));
    }

    #[test]
    fn falls_back_to_recorded_audio() {
        let (mut p, log) = pronouncer(Vec::new(), &["audio/word_12.mp3"]);
        let c = card("ねこ", "猫", "neko", Examples::default());
        assert_eq!(
            p.pronounce_word(&c, Gender::Female).unwrap(),
            Spoken::Fallback(PathBuf::from("audio/word_12.mp3"))
        );
        assert_eq!(log.borrow().played.len(), 1);
    }

    #[test]
    fn nothing_available_is_audio_unavailable() {
        let (mut p, _log) = pronouncer(vec![Voice::new("Thomas", "fr-FR")], &[]);
        let c = card("ねこ", "猫", "neko", Examples::default());
        assert!(matches!(
            p.pronounce_word(&c, Gender::Female),
            Err(VocabError::AudioUnavailable { romaji_only: false })
        ));

        let ex = Examples { romaji: "neko desu".into(), ..Examples::default() };
        let c = card("ねこ", "猫", "neko", ex);
        assert!(matches!(
            p.pronounce_example(&c, Gender::Female),
            Err(VocabError::AudioUnavailable { romaji_only: true })
        ));
        assert!(matches!(p.preview(Gender::Male), Err(VocabError::AudioUnavailable { .. })));
    }

    #[test]
    fn example_without_text_is_nothing_to_speak() {
        let (mut p, _log) = pronouncer(vec![Voice::new("Kyoko", "ja-JP")], &[]);
        let c = card("ねこ", "猫", "neko", Examples::default());
        assert!(matches!(
            p.pronounce_example(&c, Gender::Female),
            Err(VocabError::NothingToSpeak)
        ));
    }
}

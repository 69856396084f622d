// ============================================
// src/speech.rs
// 音声合成エンジン (OS のコマンドを利用)
// ============================================

use std::io;
use std::process::{Child, Command, Stdio};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::voice::Voice;

/// 読み上げの速さ (通常の 0.85 倍)
pub const SPEECH_RATE: f64 = 0.85;
const SAY_DEFAULT_WPM: f64 = 175.0;
const ESPEAK_DEFAULT_WPM: f64 = 175.0;

/// 合成エンジンの抽象
pub trait SpeechEngine {
    /// 利用できる音声の一覧
    fn voices(&mut self) -> Vec<Voice>;
    /// 読み上げ中の発話を止めてから新しく話す
    fn speak(&mut self, text: &str, voice: Option<&str>) -> io::Result<()>;
    fn cancel(&mut self);
}

/// 音声合成を使わない
#[derive(Debug, Default)]
pub struct NullSpeech;

impl SpeechEngine for NullSpeech {
    fn voices(&mut self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, _text: &str, _voice: Option<&str>) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "speech synthesis disabled"))
    }

    fn cancel(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// macOS の `say`
    Say,
    /// `espeak-ng`
    Espeak,
}

impl Backend {
    pub fn for_current_os() -> Self {
        if cfg!(target_os = "macos") { Backend::Say } else { Backend::Espeak }
    }

    fn program(self) -> &'static str {
        match self {
            Backend::Say => "say",
            Backend::Espeak => "espeak-ng",
        }
    }
}

/// 外部コマンドで読み上げる。同時に鳴るのは 1 つだけ
#[derive(Debug)]
pub struct CommandSpeech {
    backend: Backend,
    program: String,
    /// 指定されていれば、読み上げ時は `program fixed_args` をそのまま起動する
    fixed_args: Option<Vec<String>>,
    child: Option<Child>,
}

impl CommandSpeech {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            program: backend.program().to_string(),
            fixed_args: None,
            child: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Backend::for_current_os())
    }

    /// 読み上げの代わりに任意のコマンドを起動する (テスト用)
    #[cfg(test)]
    pub fn with_program(program: &str, args: &[&str]) -> Self {
        Self {
            backend: Backend::for_current_os(),
            program: program.to_string(),
            fixed_args: Some(args.iter().map(|a| a.to_string()).collect()),
            child: None,
        }
    }

    #[cfg(test)]
    fn child_id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn list_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.backend {
            Backend::Say => cmd.args(["-v", "?"]),
            Backend::Espeak => cmd.arg("--voices"),
        };
        cmd
    }

    fn speak_command(&self, text: &str, voice: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(args) = &self.fixed_args {
            cmd.args(args);
            cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
            return cmd;
        }
        match self.backend {
            Backend::Say => {
                let rate = (SAY_DEFAULT_WPM * SPEECH_RATE).round() as u32;
                cmd.arg("-r").arg(rate.to_string());
                if let Some(v) = voice {
                    cmd.args(["-v", v]);
                }
            }
            Backend::Espeak => {
                let rate = (ESPEAK_DEFAULT_WPM * SPEECH_RATE).round() as u32;
                cmd.arg("-s").arg(rate.to_string());
                cmd.args(["-v", voice.unwrap_or("ja")]);
            }
        }
        // "-" で始まる文をオプションと誤解させない
        cmd.arg("--").arg(text);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }
}

impl SpeechEngine for CommandSpeech {
    fn voices(&mut self) -> Vec<Voice> {
        match self.list_command().output() {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout);
                match self.backend {
                    Backend::Say => parse_say_voices(&text),
                    Backend::Espeak => parse_espeak_voices(&text),
                }
            }
            Ok(out) => {
                warn!("{} voice listing exited with {}", self.program, out.status);
                Vec::new()
            }
            Err(e) => {
                warn!("{} is not available: {e}", self.program);
                Vec::new()
            }
        }
    }

    fn speak(&mut self, text: &str, voice: Option<&str>) -> io::Result<()> {
        self.cancel();
        debug!("speak {:?} with voice {:?}", text, voice);
        let child = self.speak_command(text, voice).spawn()?;
        self.child = Some(child);
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            // すでに終わっていれば kill は失敗するだけ
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!("utterance {} stopped: {status}", child.id()),
                Err(e) => warn!("could not reap utterance {}: {e}", child.id()),
            }
        }
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.cancel();
    }
}

static SAY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+?)\s+(?P<lang>[A-Za-z]{2,3}[_-][A-Za-z0-9]+)\s+#").unwrap()
});

/// `say -v ?` の出力を読む
/// 例: `Kyoko               ja_JP    # こんにちは、私の名前はKyokoです。`
pub fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| SAY_LINE.captures(line))
        .map(|caps| Voice::new(caps["name"].trim(), &caps["lang"]))
        .collect()
}

/// `espeak-ng --voices` の出力を読む
/// 例: ` 5  ja              --/M      Japanese           jpx/ja`
pub fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            match cols.as_slice() {
                [_pty, lang, _age_gender, name, ..] => Some(Voice::new(*name, *lang)),
                _ => None,
            }
        })
        .collect()
}

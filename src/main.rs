// ============================================
// src/main.rs (メインファイル)
// ============================================

use std::fs::{self, OpenOptions};
use std::io::{Result, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

mod app;
mod audio;
mod dataset;
mod errors;
mod filters;
mod navigation;
mod phrases;
mod save_data;
mod schema;
mod speech;
mod verify;
mod voice;

use app::{AppState, Overlay, PLACEHOLDER};
use audio::{CommandPlayer, Pronouncer};
use dataset::Dataset;
use filters::{Mode, category_label, level_label};
use save_data::{PreferenceStore, default_data_dir};
use speech::{CommandSpeech, NullSpeech, SpeechEngine};
use verify::Status;
use voice::{Gender, NamePatternClassifier, classify_voices};

use clap::{Parser, Subcommand};
use console::style;
use crossterm::{
    ExecutableCommand,
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dialoguer::Confirm;
use log::{error, info, warn};
use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const LOG_FILE: &str = "vockit.log";

// --------------------------------------------------
// コマンドライン引数
// --------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "vockit", about = "Japanese vocabulary flashcards", version)]
struct Cli {
    /// 語彙データ (JSON 配列)
    #[arg(long, default_value = "voc_kit_400_top.json")]
    data: PathBuf,

    /// 会話文データ (JSON 配列)
    #[arg(long, default_value = "livreJaponais.json")]
    phrases: PathBuf,

    /// 録音済み MP3 のディレクトリ
    #[arg(long, default_value = "audio")]
    audio_dir: PathBuf,

    /// 出題モード (保存された設定より優先)
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// 音声合成を使わない
    #[arg(long)]
    no_speech: bool,

    /// 設定とログの保存先
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 検出された音声と女性 / 男性の振り分けを表示する
    Voices,
    /// 保存された設定を削除する
    Reset,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    init_logging(&data_dir);

    let result = match cli.command {
        Some(Command::Voices) => list_voices(&cli),
        Some(Command::Reset) => reset_preferences(&data_dir),
        None => run(&cli, &data_dir),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

/// TUI が端末を使うので、ログはファイルへ出す
fn init_logging(data_dir: &Path) {
    if fs::create_dir_all(data_dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE))
    else {
        return;
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn speech_engine(cli: &Cli) -> Box<dyn SpeechEngine> {
    if cli.no_speech {
        Box::new(NullSpeech)
    } else {
        Box::new(CommandSpeech::system())
    }
}

fn list_voices(cli: &Cli) -> Result<ExitCode> {
    let mut engine = speech_engine(cli);
    let voices = engine.voices();
    let candidates = classify_voices(&voices);

    println!("{}", style(format!("{} voice(s) detected", voices.len())).bold());
    for v in &voices {
        let mark = if v.is_japanese() { style("ja").green() } else { style("--").dim() };
        println!("  [{mark}] {} ({})", v.name, v.lang);
    }
    for gender in [Gender::Female, Gender::Male] {
        match candidates.select(gender) {
            Some(name) => println!("{gender}: {}", style(name).cyan()),
            None => println!("{gender}: {}", style("no Japanese voice").yellow()),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn reset_preferences(data_dir: &Path) -> Result<ExitCode> {
    let confirmed = Confirm::new()
        .with_prompt(format!("Delete saved preferences in {}?", data_dir.display()))
        .default(false)
        .interact()
        .map_err(std::io::Error::other)?;
    if confirmed {
        PreferenceStore::at(data_dir)
            .reset()
            .map_err(std::io::Error::other)?;
        println!("{}", style("Preferences deleted.").green());
    }
    Ok(ExitCode::SUCCESS)
}

fn run(cli: &Cli, data_dir: &Path) -> Result<ExitCode> {
    let dataset = match Dataset::load(&cli.data) {
        Ok(d) => d,
        Err(e) => {
            // 読み込めないまま空のデータで始めない
            error!("{e}");
            eprintln!(
                "{} could not load the vocabulary. Check the file path. Detail: {e}",
                style("error:").red().bold()
            );
            return Ok(ExitCode::FAILURE);
        }
    };
    if dataset.is_empty() {
        warn!("{} contains no entries", cli.data.display());
    }

    let pronouncer = Pronouncer::new(
        speech_engine(cli),
        Box::new(CommandPlayer::system()),
        Box::new(NamePatternClassifier::default()),
        cli.audio_dir.clone(),
    );
    let mut app_state = AppState::new(
        dataset,
        PreferenceStore::at(data_dir),
        pronouncer,
        cli.phrases.clone(),
        cli.mode,
    );
    info!("session started");

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app_state);
    restore_terminal(&mut terminal)?;
    app_state.stop_audio();
    result.map(|_| ExitCode::SUCCESS)
}

fn setup_terminal() -> Result<Terminal<impl Backend>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?; // 代替スクリーンを使用
    stdout().execute(Hide)?; // カーソルを非表示
    let backend = CrosstermBackend::new(stdout());
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(_terminal: &mut Terminal<impl Backend>) -> Result<()> {
    stdout().execute(Show)?; // カーソルを再表示
    stdout().execute(LeaveAlternateScreen)?; // 代替スクリーンを終了
    disable_raw_mode()?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<impl Backend>, app_state: &mut AppState) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app_state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == event::KeyEventKind::Press && !handle_key(app_state, key) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// キー入力の処理。終了するときは false
fn handle_key(app_state: &mut AppState, key: KeyEvent) -> bool {
    // お知らせはどのキーでも閉じる
    if app_state.notice.is_some() {
        app_state.notice = None;
        return true;
    }

    match app_state.overlay {
        Overlay::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::F(1)) {
                app_state.overlay = Overlay::None;
            }
            return true;
        }
        Overlay::Phrases => {
            match key.code {
                KeyCode::Esc | KeyCode::F(9) => app_state.overlay = Overlay::None,
                KeyCode::Right => app_state.next_phrase(),
                KeyCode::Left => app_state.previous_phrase(),
                KeyCode::Down => app_state.next_lesson(),
                KeyCode::Up => app_state.previous_lesson(),
                KeyCode::Enter | KeyCode::Char(' ') => app_state.speak_phrase(),
                _ => {}
            }
            return true;
        }
        Overlay::None => {}
    }

    match key.code {
        KeyCode::Esc => return false,
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => app_state.random(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
        KeyCode::Char(c) => app_state.push_char(c),
        KeyCode::Backspace => app_state.backspace(),
        KeyCode::Enter => {
            app_state.verify();
        }
        KeyCode::Right => app_state.next(),
        KeyCode::Left => app_state.previous(),
        KeyCode::F(1) => app_state.overlay = Overlay::Help,
        KeyCode::F(2) => app_state.cycle_mode(),
        KeyCode::F(3) => app_state.cycle_level(),
        KeyCode::F(4) => app_state.cycle_category(),
        KeyCode::F(5) => app_state.speak_word(),
        KeyCode::F(6) => app_state.speak_example(),
        KeyCode::F(7) => app_state.toggle_voice(),
        KeyCode::F(8) => app_state.preview_voice(),
        KeyCode::F(9) => app_state.open_phrases(),
        _ => {}
    }
    true
}

// --------------------------------------------------
// UI描画
// --------------------------------------------------

fn mode_color(mode: Mode) -> Color {
    match mode {
        Mode::French => Color::Blue,
        Mode::Romaji => Color::Green,
        Mode::Kana => Color::Magenta,
        Mode::Kanji => Color::Red,
    }
}

fn or_placeholder(s: &str) -> &str {
    if s.is_empty() { PLACEHOLDER } else { s }
}

fn ui(f: &mut Frame, app_state: &AppState) {
    let size = f.area();
    // 枠線を描画
    let block = Block::default().borders(Borders::ALL).title("VOC KIT");
    let inner_area = block.inner(size);
    f.render_widget(block, size);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // [0] ステータスバー (モード・レベル・カテゴリ)
            Constraint::Length(1), // [1] 単語数・番号・音声
            Constraint::Length(1), // [2] 空白
            Constraint::Length(3), // [3] 問題
            Constraint::Length(3), // [4] 解答欄
            Constraint::Min(1),    // [5] 結果
            Constraint::Length(1), // [6] キー操作
        ])
        .split(inner_area);

    let selection = app_state.selection();

    // 0. ステータスバー
    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", selection.mode.label()),
            Style::default().fg(Color::Black).bg(mode_color(selection.mode)),
        ),
        Span::raw("  "),
        Span::styled(level_label(&selection.level), Style::default().fg(Color::Yellow)),
        Span::raw("  /  "),
        Span::styled(category_label(&selection.category), Style::default().fg(Color::Yellow)),
    ]);
    f.render_widget(Paragraph::new(status), chunks[0]);

    // 1. 単語数と番号
    let stats = app_state.stats();
    let count_text = match &selection.category {
        filters::Choice::All => format!("Total words: {}", stats.count),
        filters::Choice::Value(v) => format!("{} words ({v})", stats.count),
    };
    let total = stats.of_filtered.unwrap_or(stats.count);
    let pos_text = match stats.position {
        Some(p) => format!("No. {p} / {total}"),
        None => format!("No. — / {total}"),
    };
    let voice_text = format!(
        "{} voice · {}",
        app_state.voice_gender(),
        if app_state.has_japanese_voice() { "JA voice detected" } else { "JA voice not found" }
    );
    let score = app_state.score;
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(count_text, Style::default().fg(Color::Gray)),
            Span::raw("   "),
            Span::styled(pos_text, Style::default().fg(Color::Gray)),
            Span::raw("   "),
            Span::styled(format!("✓ {}  ✗ {}", score.correct, score.incorrect), Style::default().fg(Color::Yellow)),
            Span::raw("   "),
            Span::styled(voice_text, Style::default().fg(Color::DarkGray)),
        ])),
        chunks[1],
    );

    // 2. 問題
    let prompt = app_state.prompt_text().unwrap_or_else(|| PLACEHOLDER.to_string());
    f.render_widget(
        Paragraph::new(prompt)
            .style(Style::default().fg(mode_color(selection.mode)).bold())
            .block(Block::default().borders(Borders::ALL).title("Word"))
            .centered(),
        chunks[3],
    );

    // 3. 解答欄
    let mark = match app_state.verification.as_ref().map(|v| v.status) {
        Some(Status::Correct) => Span::styled(" ✓", Style::default().fg(Color::Green).bold()),
        Some(Status::Incorrect) => Span::styled(" ✗", Style::default().fg(Color::Red).bold()),
        _ => Span::raw(""),
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(app_state.answer.as_str()),
            Span::styled("_", Style::default().fg(Color::DarkGray)),
            mark,
        ]))
        .block(Block::default().borders(Borders::ALL).title("Answer (Enter to check)")),
        chunks[4],
    );

    // 4. 結果 (4 表記と例文)
    if let Some(v) = &app_state.verification {
        let label = |name: &str| Span::styled(format!("{name}: "), Style::default().fg(Color::Gray));
        let value = |text: &str, color: Color, placeholder: bool| {
            let text = if placeholder { or_placeholder(text) } else { text };
            Span::styled(text.to_string(), Style::default().fg(color))
        };
        let status_line = match v.status {
            Status::Correct => Line::from("Correct ✓").style(Style::default().fg(Color::Green)),
            Status::Incorrect => Line::from("Incorrect ✗").style(Style::default().fg(Color::Red)),
            Status::NoAnswer => Line::from(""),
        };
        let r = &v.reference;
        let e = &v.examples;
        let lines = vec![
            status_line,
            Line::from(vec![label("Français"), value(&r.french, mode_color(Mode::French), true)]),
            Line::from(vec![label("Rōmaji"), value(&r.romaji, mode_color(Mode::Romaji), true)]),
            Line::from(vec![label("かな"), value(&r.kana, mode_color(Mode::Kana), true)]),
            Line::from(vec![label("漢字"), value(&r.kanji, mode_color(Mode::Kanji), true)]),
            Line::from(""),
            Line::from(vec![label("Example (FR)"), value(&e.french, mode_color(Mode::French), false)]),
            Line::from(vec![label("Example (Rōmaji)"), value(&e.romaji, mode_color(Mode::Romaji), false)]),
            Line::from(vec![label("Example (かな)"), value(&e.kana, mode_color(Mode::Kana), false)]),
            Line::from(vec![label("Example (日本語)"), value(&e.japanese, mode_color(Mode::Kanji), false)]),
        ];
        f.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::TOP).title("Result")),
            chunks[5],
        );
    }

    // 5. キー操作
    f.render_widget(
        Paragraph::new(
            "←/→ move  ^R random  F2 mode  F3 level  F4 category  F5 word  F6 example  F7 voice  F8 preview  F9 phrases  F1 help  Esc quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
        chunks[6],
    );

    match app_state.overlay {
        Overlay::Help => help_popup(f, size),
        Overlay::Phrases => phrases_popup(f, size, app_state),
        Overlay::None => {}
    }

    if let Some(notice) = &app_state.notice {
        notice_popup(f, size, notice);
    }
}

/// 中央に置く矩形
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height);
    // u16 のままだと広い端末で桁あふれする
    let width = (u32::from(area.width) * u32::from(percent_x.min(100)) / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn help_popup(f: &mut Frame, area: Rect) {
    let rect = centered_rect(70, 14, area);
    let text = vec![
        Line::from("Read the word, type your answer and press Enter."),
        Line::from(""),
        Line::from("Français shown  → answer in rōmaji"),
        Line::from("Rōmaji shown    → answer in French"),
        Line::from("かな / 漢字 shown → answer in French, kana or kanji"),
        Line::from("Enter with an empty answer reveals the solution."),
        Line::from(""),
        Line::from("F3/F4 filter by level and category; your place is remembered."),
        Line::from("F5/F6 pronounce the word / example (MP3 fallback in the audio folder)."),
        Line::from("F9 opens the dialogue lines: ←/→ lines, ↑/↓ lessons, Space to listen."),
    ];
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("How to use (Esc to close)")),
        rect,
    );
}

fn phrases_popup(f: &mut Frame, area: Rect, app_state: &AppState) {
    let Some((book, cursor)) = app_state.phrase_view() else {
        return;
    };
    let rect = centered_rect(80, 12, area);
    let title = cursor
        .lesson(book)
        .map(|l| l.label())
        .unwrap_or_default();
    let line = cursor.current(book);
    let field = |value: Option<&Option<String>>| {
        value
            .and_then(Option::as_deref)
            .unwrap_or(PLACEHOLDER)
            .to_string()
    };
    let text = vec![
        Line::from(field(line.map(|l| &l.japanese))).style(Style::default().fg(Color::Red).bold()),
        Line::from(field(line.map(|l| &l.kana))).style(Style::default().fg(Color::Magenta)),
        Line::from(field(line.map(|l| &l.romaji))).style(Style::default().fg(Color::Green)),
        Line::from(field(line.map(|l| &l.french))).style(Style::default().fg(Color::Blue)),
        Line::from(""),
        Line::from(cursor.status(book)).style(Style::default().fg(Color::DarkGray)),
        Line::from("←/→ line  ↑/↓ lesson  Space listen  Esc close")
            .style(Style::default().fg(Color::DarkGray)),
    ];
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(title)),
        rect,
    );
}

fn notice_popup(f: &mut Frame, area: Rect, message: &str) {
    let rect = centered_rect(60, 5, area);
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(message.to_string())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::White))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title("Notice (any key)"),
            ),
        rect,
    );
}

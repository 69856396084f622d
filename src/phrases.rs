// ============================================
// src/phrases.rs
// 会話文 (レッスンごとのセリフ) の読み込みと移動
// ============================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::LoadError;
use crate::schema::value_text;

/// レッスンの見出し行
const TITLE_LINE: &str = "S00";

/// セリフ 1 行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseLine {
    pub lesson: String,
    pub line: String,
    pub japanese: Option<String>,
    pub kana: Option<String>,
    pub romaji: Option<String>,
    pub french: Option<String>,
}

impl PhraseLine {
    fn from_value(row: &Value) -> Self {
        let get = |key: &str| {
            row.get(key)
                .and_then(value_text)
                .filter(|s| !s.is_empty())
        };
        Self {
            lesson: get("lesson").unwrap_or_default(),
            line: get("line").unwrap_or_default(),
            japanese: get("japanese"),
            kana: get("kana"),
            romaji: get("romaji"),
            french: get("french"),
        }
    }

    fn is_title(&self) -> bool {
        self.line.eq_ignore_ascii_case(TITLE_LINE)
    }
}

static LINE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)S(\d+)").unwrap());

/// "S03" -> 3。読めなければ 0
pub fn parse_line_id(line: &str) -> u32 {
    LINE_ID
        .captures(line)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// "N12" -> Some(12)
fn lesson_number(id: &str) -> Option<u32> {
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: String,
    pub num: Option<u32>,
    pub title_kana: String,
    pub title_french: String,
    pub lines: Vec<PhraseLine>,
}

impl Lesson {
    /// 選択欄の表示名
    pub fn label(&self) -> String {
        let num = self.num.map(|n| n.to_string()).unwrap_or_default();
        if self.title_french.is_empty() {
            format!("Lesson {num} — {}", self.title_kana)
        } else {
            format!("Lesson {num} — {} — {}", self.title_kana, self.title_french)
        }
    }

    /// 見出し行 (S00) があればそこから、無ければ先頭から
    pub fn first_content_index(&self) -> usize {
        self.lines.iter().position(PhraseLine::is_title).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseBook {
    lessons: Vec<Lesson>,
}

impl PhraseBook {
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
        let book = Self::from_rows(&rows);
        info!("loaded {} lessons from {}", book.lessons.len(), path.display());
        Ok(book)
    }

    pub fn from_rows(rows: &[Value]) -> Self {
        // 出現順を保ったままレッスンごとにまとめる
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<PhraseLine>> = HashMap::new();
        for row in rows {
            let line = PhraseLine::from_value(row);
            if !grouped.contains_key(&line.lesson) {
                order.push(line.lesson.clone());
            }
            grouped.entry(line.lesson.clone()).or_default().push(line);
        }

        let mut lessons: Vec<Lesson> = order
            .into_iter()
            .map(|id| {
                let mut lines = grouped.remove(&id).unwrap_or_default();
                lines.sort_by_key(|l| parse_line_id(&l.line));

                let title = lines.iter().rev().find(|l| l.is_title());
                let title_kana = title
                    .and_then(|l| l.kana.clone())
                    .or_else(|| lines.iter().find_map(|l| l.kana.clone()))
                    .unwrap_or_else(|| "—".to_string());
                let title_french = title
                    .and_then(|l| l.french.clone())
                    .or_else(|| lines.iter().find_map(|l| l.french.clone()))
                    .unwrap_or_default();

                Lesson {
                    num: lesson_number(&id),
                    id,
                    title_kana,
                    title_french,
                    lines,
                }
            })
            .collect();
        lessons.sort_by_key(|l| l.num.unwrap_or(0));

        Self { lessons }
    }

    #[cfg(test)]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

/// 会話文ビューの現在位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseCursor {
    lesson: usize,
    line: usize,
}

impl PhraseCursor {
    /// 最初のレッスンの見出し行から始める
    pub fn open(book: &PhraseBook) -> Option<Self> {
        let first = book.lessons.first()?;
        Some(Self {
            lesson: 0,
            line: first.first_content_index(),
        })
    }

    pub fn lesson<'a>(&self, book: &'a PhraseBook) -> Option<&'a Lesson> {
        book.lessons.get(self.lesson)
    }

    pub fn current<'a>(&self, book: &'a PhraseBook) -> Option<&'a PhraseLine> {
        let lesson = self.lesson(book)?;
        lesson.lines.get(self.line).or_else(|| lesson.lines.first())
    }

    pub fn select_lesson(&mut self, book: &PhraseBook, index: usize) {
        if let Some(lesson) = book.lessons.get(index) {
            self.lesson = index;
            self.line = lesson.first_content_index();
        }
    }

    pub fn next_lesson(&mut self, book: &PhraseBook) {
        let len = book.lessons.len();
        if len > 0 {
            self.select_lesson(book, (self.lesson + 1) % len);
        }
    }

    pub fn previous_lesson(&mut self, book: &PhraseBook) {
        let len = book.lessons.len();
        if len > 0 {
            self.select_lesson(book, (self.lesson + len - 1) % len);
        }
    }

    pub fn next(&mut self, book: &PhraseBook) {
        self.step(book, 1);
    }

    pub fn previous(&mut self, book: &PhraseBook) {
        self.step(book, -1);
    }

    fn step(&mut self, book: &PhraseBook, delta: isize) {
        let Some(lesson) = self.lesson(book) else {
            return;
        };
        let len = lesson.lines.len() as isize;
        if len == 0 {
            return;
        }
        self.line = ((self.line as isize + delta + len) % len) as usize;
    }

    /// "N1 S03 · 4/7"
    pub fn status(&self, book: &PhraseBook) -> String {
        match (self.lesson(book), self.current(book)) {
            (Some(lesson), Some(line)) => format!(
                "{} {} · {}/{}",
                lesson.id,
                line.line,
                self.line + 1,
                lesson.lines.len()
            ),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"lesson": "N10", "line": "S02", "japanese": "元気です。", "kana": "げんきです。"}),
            json!({"lesson": "N2", "line": "S1", "japanese": "はい。", "french": "Oui."}),
            json!({"lesson": "N10", "line": "S00", "kana": "あいさつ", "french": "Salutations"}),
            json!({"lesson": "N10", "line": "S01", "japanese": "お元気ですか。"}),
            json!({"lesson": "N2", "line": "S00", "kana": "へんじ"}),
        ]
    }

    #[test]
    fn line_ids_parse_numbers() {
        assert_eq!(parse_line_id("S00"), 0);
        assert_eq!(parse_line_id("s12"), 12);
        assert_eq!(parse_line_id("intro"), 0);
    }

    #[test]
    fn lessons_are_grouped_and_sorted() {
        let book = PhraseBook::from_rows(&rows());
        let ids: Vec<&str> = book.lessons().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["N2", "N10"]);

        let n10 = &book.lessons()[1];
        let lines: Vec<&str> = n10.lines.iter().map(|l| l.line.as_str()).collect();
        assert_eq!(lines, vec!["S00", "S01", "S02"]);
        assert_eq!(n10.title_kana, "あいさつ");
        assert_eq!(n10.title_french, "Salutations");
        assert_eq!(n10.label(), "Lesson 10 — あいさつ — Salutations");

        // S00 に french が無ければ他の行から取る
        let n2 = &book.lessons()[0];
        assert_eq!(n2.title_french, "Oui.");
    }

    #[test]
    fn cursor_starts_at_title_and_wraps() {
        let book = PhraseBook::from_rows(&rows());
        let mut cursor = PhraseCursor::open(&book).unwrap();
        assert_eq!(cursor.current(&book).unwrap().line, "S00");
        assert_eq!(cursor.status(&book), "N2 S00 · 1/2");

        cursor.previous(&book);
        assert_eq!(cursor.current(&book).unwrap().line, "S1");
        cursor.next(&book);
        assert_eq!(cursor.current(&book).unwrap().line, "S00");

        cursor.next_lesson(&book);
        cursor.next(&book);
        assert_eq!(cursor.status(&book), "N10 S01 · 2/3");
        cursor.next_lesson(&book);
        assert_eq!(cursor.lesson(&book).unwrap().id, "N2");
        cursor.previous_lesson(&book);
        assert_eq!(cursor.current(&book).unwrap().line, "S00");
    }

    #[test]
    fn empty_book_has_no_cursor() {
        let book = PhraseBook::from_rows(&[]);
        assert!(book.is_empty());
        assert!(PhraseCursor::open(&book).is_none());
    }
}

// ============================================
// src/navigation.rs
// 絞り込み結果の中を移動するカーソル
// ============================================

use rand::Rng;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    filtered: Vec<usize>,
    /// `filtered` 内の位置。空のときは None
    index: Option<usize>,
}

impl Cursor {
    pub fn new(filtered: Vec<usize>, start: usize) -> Self {
        let index = if filtered.is_empty() {
            None
        } else {
            Some(start.min(filtered.len() - 1))
        };
        Self { filtered, index }
    }

    /// 移動できないカーソル (該当なし)
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn filtered(&self) -> &[usize] {
        &self.filtered
    }

    #[cfg(test)]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// 現在のデータ位置
    pub fn current(&self) -> Option<usize> {
        self.index.and_then(|i| self.filtered.get(i).copied())
    }

    /// 次へ (末尾の次は先頭)
    pub fn next(&mut self) -> Option<usize> {
        self.step(1)
    }

    /// 前へ (先頭の前は末尾)
    pub fn previous(&mut self) -> Option<usize> {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> Option<usize> {
        let len = self.filtered.len() as isize;
        let i = self.index? as isize;
        self.index = Some(((i + delta + len) % len) as usize);
        self.current()
    }

    /// 今と違う位置へランダムに移動する。1 件だけならそのまま
    pub fn random_jump<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        let current = self.index?;
        let len = self.filtered.len();
        if len > 1 {
            let mut n = rng.random_range(0..len);
            while n == current {
                n = rng.random_range(0..len);
            }
            self.index = Some(n);
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn next_and_previous_wrap() {
        let mut cursor = Cursor::new(vec![4, 7, 9], 2);
        assert_eq!(cursor.current(), Some(9));
        assert_eq!(cursor.next(), Some(4));
        assert_eq!(cursor.previous(), Some(9));
        assert_eq!(cursor.previous(), Some(7));
    }

    #[test]
    fn full_cycle_returns_to_start() {
        for len in 1..8 {
            for start in 0..len {
                let mut cursor = Cursor::new((0..len).map(|i| i * 10).collect(), start);
                for _ in 0..len {
                    cursor.next();
                }
                assert_eq!(cursor.index(), Some(start));
                for _ in 0..len {
                    cursor.previous();
                }
                assert_eq!(cursor.index(), Some(start));
            }
        }
    }

    #[test]
    fn empty_cursor_does_nothing() {
        let mut cursor = Cursor::empty();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.previous(), None);
        assert_eq!(cursor.random_jump(&mut rng), None);
        assert_eq!(cursor.index(), None);
        assert_eq!(Cursor::new(Vec::new(), 3).index(), None);
    }

    #[test]
    fn random_jump_never_repeats() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in 2..6 {
            let mut cursor = Cursor::new((0..len).collect(), 0);
            for _ in 0..200 {
                let before = cursor.index();
                cursor.random_jump(&mut rng);
                assert_ne!(cursor.index(), before);
            }
        }
    }

    #[test]
    fn random_jump_with_single_entry_stays() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cursor = Cursor::new(vec![5], 0);
        assert_eq!(cursor.random_jump(&mut rng), Some(5));
        assert_eq!(cursor.index(), Some(0));
    }

    #[test]
    fn start_is_clamped() {
        let cursor = Cursor::new(vec![1, 2], 9);
        assert_eq!(cursor.index(), Some(1));
    }
}

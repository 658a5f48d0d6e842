//! Hangman game rules and word selection.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use rand::seq::SliceRandom;

/// The words a game round can pick from, loaded once at startup so the
/// connection handling never touches the filesystem.
#[derive(Debug)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// The embedded default list.
    pub fn builtin() -> Self {
        WordList {
            words: parse_words(include_str!("words.txt")),
        }
    }

    /// Reads a newline-separated word file.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        WordList::from_words(parse_words(&text)).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no words in {}", path.display()),
            )
        })
    }

    /// Returns `None` when `words` is empty.
    pub fn from_words(words: Vec<String>) -> Option<Self> {
        if words.is_empty() {
            None
        } else {
            Some(WordList { words })
        }
    }

    pub fn random_word(&self) -> String {
        self.words
            .choose(&mut rand::thread_rng())
            .map(|word| word.to_ascii_uppercase())
            .unwrap_or_default()
    }
}

fn parse_words(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// One game state report, sent back after every start or guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameUpdate {
    /// The revealed word so far, or a game-over / usage notice.
    pub text: String,
    pub attempts_left: usize,
    pub score: i64,
}

impl GameUpdate {
    pub fn into_fields(self) -> Vec<String> {
        vec![
            self.text,
            self.attempts_left.to_string(),
            self.score.to_string(),
        ]
    }
}

/// Hangman game logic and score for one client session.
///
/// A round grants as many attempts as the word has letters. A finished
/// round moves the score by one in either direction; starting a new round
/// while one is unfinished also counts as a loss.
#[derive(Debug)]
pub struct HangmanGame {
    words: Arc<WordList>,
    word: Vec<char>,
    revealed: Vec<char>,
    attempts_left: usize,
    score: i64,
    forfeit_pending: bool,
}

impl HangmanGame {
    pub fn new(words: Arc<WordList>) -> Self {
        HangmanGame {
            words,
            word: Vec::new(),
            revealed: Vec::new(),
            attempts_left: 0,
            score: 0,
            forfeit_pending: false,
        }
    }

    /// Starts a round with a fresh random word.
    pub fn start(&mut self) -> GameUpdate {
        self.word = self.words.random_word().chars().collect();
        self.attempts_left = self.word.len();
        self.revealed = vec!['_'; self.word.len()];
        if self.forfeit_pending {
            self.score -= 1;
        } else {
            self.forfeit_pending = true;
        }
        self.progress()
    }

    /// Applies a single-letter or whole-word guess.
    pub fn guess(&mut self, guess: Option<&str>) -> GameUpdate {
        if self.attempts_left == 0 {
            return self.notice("Start a new game!");
        }
        let Some(guess) = guess.filter(|text| !text.is_empty()) else {
            return self.notice("Enter a letter or a word!");
        };

        let mut chars = guess.chars();
        let first = chars.next();
        let hit = match (first, chars.next()) {
            (Some(letter), None) => self.guess_letter(letter),
            _ => self.guess_word(guess),
        };

        if !hit {
            self.attempts_left -= 1;
            if self.attempts_left == 0 {
                self.score -= 1;
                self.forfeit_pending = false;
                return GameUpdate {
                    text: format!("GameOver: {}", spaced(&self.word)),
                    attempts_left: 0,
                    score: self.score,
                };
            }
        }
        if self.is_won() {
            self.attempts_left = 0;
            self.score += 1;
            self.forfeit_pending = false;
        }
        self.progress()
    }

    fn guess_letter(&mut self, letter: char) -> bool {
        let letter = letter.to_ascii_uppercase();
        let mut hit = false;
        for (i, c) in self.word.iter().enumerate() {
            if *c == letter {
                self.revealed[i] = letter;
                hit = true;
            }
        }
        hit
    }

    fn guess_word(&mut self, guess: &str) -> bool {
        let guess: Vec<char> = guess.to_ascii_uppercase().chars().collect();
        if guess == self.word {
            self.revealed = self.word.clone();
            true
        } else {
            false
        }
    }

    fn is_won(&self) -> bool {
        !self.word.is_empty() && self.revealed == self.word
    }

    fn progress(&self) -> GameUpdate {
        GameUpdate {
            text: spaced(&self.revealed),
            attempts_left: self.attempts_left,
            score: self.score,
        }
    }

    fn notice(&self, text: &str) -> GameUpdate {
        GameUpdate {
            text: text.to_string(),
            attempts_left: self.attempts_left,
            score: self.score,
        }
    }
}

fn spaced(letters: &[char]) -> String {
    let mut out = String::with_capacity(letters.len() * 2);
    for (i, c) in letters.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(*c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with_word(word: &str) -> HangmanGame {
        let words = Arc::new(WordList::from_words(vec![word.to_string()]).unwrap());
        HangmanGame::new(words)
    }

    #[test]
    fn test_start_grants_one_attempt_per_letter() {
        let mut game = game_with_word("hello");
        let update = game.start();
        assert_eq!(update.text, "_ _ _ _ _");
        assert_eq!(update.attempts_left, 5);
        assert_eq!(update.score, 0);
    }

    #[test]
    fn test_correct_letter_reveals_all_occurrences() {
        let mut game = game_with_word("hello");
        game.start();
        let update = game.guess(Some("l"));
        assert_eq!(update.text, "_ _ L L _");
        assert_eq!(update.attempts_left, 5);
    }

    #[test]
    fn test_wrong_letter_costs_an_attempt() {
        let mut game = game_with_word("hello");
        game.start();
        let update = game.guess(Some("z"));
        assert_eq!(update.text, "_ _ _ _ _");
        assert_eq!(update.attempts_left, 4);
    }

    #[test]
    fn test_winning_by_letters_scores_a_point() {
        let mut game = game_with_word("ab");
        game.start();
        game.guess(Some("a"));
        let update = game.guess(Some("b"));
        assert_eq!(update.text, "A B");
        assert_eq!(update.attempts_left, 0);
        assert_eq!(update.score, 1);
    }

    #[test]
    fn test_winning_by_whole_word() {
        let mut game = game_with_word("hello");
        game.start();
        let update = game.guess(Some("HELLO"));
        assert_eq!(update.text, "H E L L O");
        assert_eq!(update.score, 1);
    }

    #[test]
    fn test_losing_reveals_the_word_and_costs_a_point() {
        let mut game = game_with_word("ab");
        game.start();
        game.guess(Some("x"));
        let update = game.guess(Some("y"));
        assert_eq!(update.text, "GameOver: A B");
        assert_eq!(update.attempts_left, 0);
        assert_eq!(update.score, -1);
    }

    #[test]
    fn test_guess_before_start_prompts_for_a_new_game() {
        let mut game = game_with_word("hello");
        let update = game.guess(Some("h"));
        assert_eq!(update.text, "Start a new game!");
        assert_eq!(update.attempts_left, 0);
    }

    #[test]
    fn test_missing_guess_prompts_for_input() {
        let mut game = game_with_word("hello");
        game.start();
        let update = game.guess(None);
        assert_eq!(update.text, "Enter a letter or a word!");
        assert_eq!(update.attempts_left, 5);
    }

    #[test]
    fn test_abandoning_a_round_costs_a_point() {
        let mut game = game_with_word("hello");
        game.start();
        let update = game.start();
        assert_eq!(update.score, -1);
    }

    #[test]
    fn test_finished_round_makes_restart_free() {
        let mut game = game_with_word("ab");
        game.start();
        game.guess(Some("ab"));
        let update = game.start();
        assert_eq!(update.score, 1);
    }

    #[test]
    fn test_guesses_are_case_insensitive() {
        let mut game = game_with_word("hello");
        game.start();
        let update = game.guess(Some("H"));
        assert_eq!(update.text, "H _ _ _ _");
        assert_eq!(update.attempts_left, 5);
    }

    #[test]
    fn test_builtin_word_list_is_usable() {
        let words = WordList::builtin();
        let word = words.random_word();
        assert!(!word.is_empty());
        assert!(word.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_empty_word_list_is_rejected() {
        assert!(WordList::from_words(Vec::new()).is_none());
    }
}

//! Operator decision boundary
//!
//! Conflict resolution and publisher disambiguation both stop and wait for
//! an answer. The [`DecisionSource`] trait keeps that boundary injectable:
//! production wires a terminal prompt, tests wire a scripted queue with
//! identical branching behavior.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Answer to a [`DecisionSource::choose`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based index into the supplied options
    Choice(usize),
    /// Free-form replacement text (only when the prompt allows it)
    Text(String),
}

/// Blocking source of operator decisions. No timeout: a call returns only
/// when an answer is available.
pub trait DecisionSource {
    /// Present numbered `options` and return the selection. When
    /// `allow_free_form` is set, any non-numeric answer is returned as
    /// [`Selection::Text`]. Invalid input is re-asked, never guessed.
    fn choose(&mut self, prompt: &str, options: &[String], allow_free_form: bool) -> Selection;

    /// Simple yes/no question.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Terminal-backed decision source (stdin/stdout).
#[derive(Debug, Default)]
pub struct ConsoleDecisionSource;

impl ConsoleDecisionSource {
    pub fn new() -> Self {
        Self
    }
}

/// Read selections from `input` until a valid one arrives. Returns `None`
/// when the input stream ends (EOF), so callers can stop instead of
/// re-prompting forever against a closed stream.
fn next_selection(
    input: &mut impl BufRead,
    output: &mut impl Write,
    options_len: usize,
    allow_free_form: bool,
) -> Option<Selection> {
    loop {
        let _ = write!(output, "> ");
        let _ = output.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let answer = line.trim();
        if let Ok(number) = answer.parse::<usize>() {
            if number >= 1 && number <= options_len {
                return Some(Selection::Choice(number - 1));
            }
        } else if allow_free_form && !answer.is_empty() {
            return Some(Selection::Text(answer.to_string()));
        }
        let _ = writeln!(output, "Please select a number between 1 and {}", options_len);
    }
}

fn next_confirmation(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Option<bool> {
    loop {
        let _ = write!(output, "{} [y/n] ", prompt);
        let _ = output.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Some(true),
            "n" | "no" => return Some(false),
            _ => {}
        }
    }
}

/// A closed input stream means no answer can ever arrive; stop the run
/// here, before the master file is written.
fn abort_no_input(prompt: &str) -> ! {
    tracing::error!("Input closed while waiting for an answer to: {}", prompt);
    std::process::exit(2);
}

impl DecisionSource for ConsoleDecisionSource {
    fn choose(&mut self, prompt: &str, options: &[String], allow_free_form: bool) -> Selection {
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{}", prompt);
        for (i, option) in options.iter().enumerate() {
            let _ = writeln!(stdout, "{}) {}", i + 1, option);
        }
        let mut stdin = std::io::stdin().lock();
        match next_selection(&mut stdin, &mut stdout, options.len(), allow_free_form) {
            Some(selection) => selection,
            None => abort_no_input(prompt),
        }
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        let mut stdout = std::io::stdout();
        let mut stdin = std::io::stdin().lock();
        match next_confirmation(&mut stdin, &mut stdout, prompt) {
            Some(answer) => answer,
            None => abort_no_input(prompt),
        }
    }
}

/// Deterministic decision source fed from a queue of canned answers.
///
/// Panics when asked more questions than it was given answers for, which
/// turns an unexpected prompt into a test failure.
#[derive(Debug, Default)]
pub struct ScriptedDecisionSource {
    answers: VecDeque<Selection>,
    confirmations: VecDeque<bool>,
    prompts_issued: usize,
}

impl ScriptedDecisionSource {
    pub fn new(answers: Vec<Selection>) -> Self {
        Self {
            answers: answers.into(),
            confirmations: VecDeque::new(),
            prompts_issued: 0,
        }
    }

    pub fn with_confirmations(mut self, confirmations: Vec<bool>) -> Self {
        self.confirmations = confirmations.into();
        self
    }

    /// Number of choose() prompts issued so far.
    pub fn prompts_issued(&self) -> usize {
        self.prompts_issued
    }

    /// True when every scripted answer has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.answers.is_empty() && self.confirmations.is_empty()
    }
}

impl DecisionSource for ScriptedDecisionSource {
    fn choose(&mut self, prompt: &str, options: &[String], _allow_free_form: bool) -> Selection {
        self.prompts_issued += 1;
        match self.answers.pop_front() {
            Some(Selection::Choice(i)) if i >= options.len() => {
                panic!("scripted choice {} out of range for prompt: {}", i, prompt)
            }
            Some(selection) => selection,
            None => panic!("scripted decision source exhausted at prompt: {}", prompt),
        }
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts_issued += 1;
        match self.confirmations.pop_front() {
            Some(answer) => answer,
            None => panic!("scripted decision source exhausted at prompt: {}", prompt),
        }
    }
}

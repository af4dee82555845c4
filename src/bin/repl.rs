use std::borrow::Cow;
use std::env;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use carlae::{Env, EvalConfig, Evaluator, TokenKind, evaluate_str_with, tokenize};

const GENERIC_ERROR: &str = "There was an error in your statement";

/// Settings for an interactive session. Defaults can be overridden through
/// `CARLAE_*` environment variables.
#[derive(Debug, Clone)]
struct ReplConfig {
    prompt: String,
    exit_keyword: String,
    history_file: PathBuf,
    diagnostics: bool,
    eval: EvalConfig,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            prompt: "in> ".to_string(),
            exit_keyword: "quit".to_string(),
            history_file: PathBuf::from("carlae_history.txt"),
            diagnostics: false,
            eval: EvalConfig::default(),
        }
    }
}

impl ReplConfig {
    fn from_env() -> Self {
        let mut config = ReplConfig::default();
        if let Ok(path) = env::var("CARLAE_HISTORY") {
            config.history_file = PathBuf::from(path);
        }
        if let Ok(flag) = env::var("CARLAE_DIAGNOSTICS") {
            config.diagnostics = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Ok(depth) = env::var("CARLAE_MAX_DEPTH") {
            match depth.parse() {
                Ok(max_depth) => config.eval.max_depth = max_depth,
                Err(err) => warn!(%depth, %err, "ignoring invalid CARLAE_MAX_DEPTH"),
            }
        }
        config
    }
}

/// Logging is only switched on when `RUST_LOG` is set.
fn init_tracing() {
    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

struct CarlaeCompleter {
    env: Env,
}

impl rustyline::completion::Completer for CarlaeCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let tokens = tokenize(&line[..pos]);
        let candidates = match tokens.last() {
            Some(token) if token.span.end == pos => match &token.kind {
                TokenKind::Atom(prefix) => {
                    let mut matches: Vec<String> = self
                        .env
                        .borrow()
                        .identifiers()
                        .into_iter()
                        .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
                        .filter(|rest| !rest.is_empty())
                        .collect();
                    matches.sort();
                    matches
                }
                _ => vec![],
            },
            _ => vec![],
        };
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: CarlaeValidator,
    #[rustyline(Highlighter)]
    highlighter: CarlaeHighlighter,
    #[rustyline(Completer)]
    completer: CarlaeCompleter,
}

struct CarlaeValidator;

/// Counts parens left open, skipping comments. `None` once a `)` has nothing
/// to close.
fn open_parens(input: &str) -> Option<usize> {
    let mut open = 0usize;
    for line in input.lines() {
        for c in line.chars() {
            match c {
                ';' => break,
                '(' => open += 1,
                ')' => open = open.checked_sub(1)?,
                _ => {}
            }
        }
    }
    Some(open)
}

impl Validator for CarlaeValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        // A stray ')' is submitted so the parser reports it
        match open_parens(ctx.input()) {
            Some(open) if open > 0 => Ok(ValidationResult::Incomplete),
            _ => Ok(ValidationResult::Valid(None)),
        }
    }
}

struct CarlaeHighlighter;

impl Highlighter for CarlaeHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut stack: Vec<(usize, usize)> = Vec::new(); // (byte offset in output, byte offset in line)
        let mut highlighted = String::new();
        let mut in_comment = false;

        for (i, c) in line.char_indices() {
            if in_comment {
                if c == '\n' {
                    in_comment = false;
                    highlighted.push(c);
                } else {
                    highlighted.push_str(&format!("\x1b[90m{}\x1b[0m", c)); // Grey for comments
                }
                continue;
            }

            match c {
                ';' => {
                    in_comment = true;
                    highlighted.push_str(&format!("\x1b[90m{}\x1b[0m", c));
                }
                '(' => {
                    stack.push((highlighted.len(), i));
                    highlighted.push(c);
                }
                ')' => {
                    if let Some((matching_pos, opened_at)) = stack.pop() {
                        if opened_at + 1 == pos || i + 1 == pos {
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for matching brackets
                            highlighted
                                .replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                        } else {
                            highlighted.push(c);
                        }
                    } else {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched closing brackets
                    }
                }
                _ => {
                    highlighted.push(c);
                }
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    init_tracing();
    let config = ReplConfig::from_env();

    println!("carlae REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type '{}' or press Ctrl-D to quit.", config.exit_keyword);

    // One environment for the whole session so definitions persist
    let global_env = carlae::Environment::new_global();
    let mut evaluator = Evaluator::with_config(config.eval);
    let h = InputValidator {
        highlighter: CarlaeHighlighter,
        validator: CarlaeValidator,
        completer: CarlaeCompleter {
            env: global_env.clone(),
        },
    };
    let editor_config = rustyline::config::Config::builder()
        .auto_add_history(false)
        .build();
    let mut rl = Editor::with_config(editor_config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&config.history_file).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline(&config.prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input == config.exit_keyword {
                    break;
                }

                match evaluate_str_with(&mut evaluator, trimmed_input, &global_env) {
                    Ok(value) => println!("out> {}", value),
                    Err(err) if config.diagnostics => {
                        if err.pretty_print(trimmed_input).is_err() {
                            eprintln!("{}", err);
                        }
                    }
                    Err(_) => println!("{}", GENERIC_ERROR),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type '{}' or Ctrl-D to quit.", config.exit_keyword);
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&config.history_file)
}

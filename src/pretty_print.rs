use crate::{EnvError, Error, EvalError, ParseError};
use ariadne::{Config, Label, Report, ReportBuilder, ReportKind, Source};
use std::ops::Range;

type SourceSpan = (&'static str, Range<usize>);

const SOURCE_ID: &str = "REPL";

fn at(range: Range<usize>) -> SourceSpan {
    (SOURCE_ID, range)
}

impl EvalError {
    fn report(&self) -> ReportBuilder<'static, SourceSpan> {
        let range = self.span().to_range();
        let builder = Report::build(ReportKind::Error, at(range.clone()));
        match self {
            EvalError::EnvError(EnvError::UnboundVariable(symbol, _)) => builder
                .with_message(format!("Unbound symbol `{}`", symbol))
                .with_label(
                    Label::new(at(range))
                        .with_message("This symbol is not defined in the current scope"),
                ),
            EvalError::NotAProcedure(found, _) => builder
                .with_message(format!("Not a procedure: {}", found))
                .with_label(
                    Label::new(at(range))
                        .with_message("This expression cannot be called as a procedure"),
                ),
            EvalError::ArityMismatch {
                name,
                expected,
                got,
                ..
            } => builder
                .with_message(format!("Wrong number of arguments to `{}`", name))
                .with_label(Label::new(at(range)).with_message(format!(
                    "expected {} argument{}, got {}",
                    expected,
                    if *expected == 1 { "" } else { "s" },
                    got
                ))),
            EvalError::InvalidArguments(message, _) => builder
                .with_message("Invalid arguments:")
                .with_label(Label::new(at(range)).with_message(message)),
            EvalError::InvalidSpecialForm(message, _) => builder
                .with_message(format!("Invalid special form: {}", message))
                .with_label(
                    Label::new(at(range))
                        .with_message("This special form is malformed or incomplete"),
                ),
            EvalError::StackExhausted { depth, .. } => builder
                .with_message(format!("Recursion deeper than {} levels", depth))
                .with_label(
                    Label::new(at(range)).with_message("Evaluation was abandoned here"),
                ),
        }
    }
}

impl ParseError {
    fn report(&self, input: &str) -> ReportBuilder<'static, SourceSpan> {
        match self {
            ParseError::UnexpectedToken { found, expected } => {
                let range = found.span.to_range();
                Report::build(ReportKind::Error, at(range.clone()))
                    .with_message(format!("Unexpected token: {}", found.kind))
                    .with_label(Label::new(at(range)).with_message(format!("Expected {expected}")))
            }
            ParseError::UnexpectedEof(expected) => {
                let idx = input.len();
                Report::build(ReportKind::Error, at(idx..idx))
                    .with_message("Unexpected EOF")
                    .with_label(Label::new(at(idx..idx)).with_message(format!("Expected {expected}")))
            }
            ParseError::NestingTooDeep { limit, span } => {
                let range = span.to_range();
                Report::build(ReportKind::Error, at(range.clone()))
                    .with_message(format!("Lists nested deeper than {} levels", limit))
                    .with_label(Label::new(at(range)).with_message("Too deep from here"))
            }
        }
    }
}

impl Error {
    /// Renders the error against the source it came from.
    pub fn render(&self, input: &str, color: bool) -> std::io::Result<String> {
        let builder = match self {
            Error::Parse(err) => err.report(input),
            Error::Eval(err) => err.report(),
        };
        let mut buffer = Vec::new();
        builder
            .with_config(Config::default().with_color(color))
            .finish()
            .write((SOURCE_ID, Source::from(input)), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Prints the rendered report to stderr.
    pub fn pretty_print(&self, input: &str) -> std::io::Result<()> {
        eprint!("{}", self.render(input, true)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Environment, evaluate_str};

    fn render(input: &str) -> String {
        let env = Environment::new_global();
        let err = evaluate_str(input, &env).expect_err("input should fail");
        err.render(input, false).expect("rendering to a buffer should succeed")
    }

    #[test]
    fn test_render_unbound_symbol() {
        let output = render("(+ 1 missing)");
        assert!(output.contains("Unbound symbol `missing`"), "{}", output);
        assert!(output.contains("not defined in the current scope"), "{}", output);
    }

    #[test]
    fn test_render_arity() {
        let output = render("((lambda (x) x) 1 2)");
        assert!(output.contains("Wrong number of arguments to `lambda`"), "{}", output);
        assert!(output.contains("expected 1 argument, got 2"), "{}", output);
    }

    #[test]
    fn test_render_parse_errors() {
        let output = render("(+ 1 2");
        assert!(output.contains("Unexpected EOF"), "{}", output);

        let output = render("1 2");
        assert!(output.contains("Unexpected token: 2"), "{}", output);
        assert!(output.contains("Expected end of input"), "{}", output);
    }
}

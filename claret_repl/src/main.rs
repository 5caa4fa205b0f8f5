use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Parser as _, ValueEnum};
use claret::{
    execute, CompileError, Compiler, Parser, Span, TokenKind, Tokenizer, WatBackend,
    DEFAULT_ENTRY_POINT, DEFAULT_MAX_DEPTH,
};
use codesnake::{Block, CodeWidth, Label, LineIndex};
use tracing_subscriber::EnvFilter;
use yansi::Paint;

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(clap::Parser, Debug)]
#[command(version, about = "Compile and run claret programs")]
struct Args {
    /// Program to compile. Without it, read programs line by line.
    file: Option<PathBuf>,

    /// What to print for each program
    #[arg(long, value_enum, default_value_t = Emit::Result)]
    emit: Emit,

    /// How deeply lists may nest
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// `tracing` filter directives, overriding RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    /// The value of the program
    Result,
    /// The instruction listing
    Instructions,
    /// A WebAssembly text module
    Wat,
    /// The parsed top-level expressions
    Ast,
    /// The token stream, labelled over the source
    Tokens,
}

fn make_block<'a>(
    idx: &'a LineIndex,
    labels: impl IntoIterator<Item = (Span, Result<TokenKind, String>)>,
) -> Option<Block<&'a str, String>> {
    Block::new(
        idx,
        labels.into_iter().map(|(range, label)| {
            let text = match &label {
                Ok(kind) => kind.to_string().green().to_string(),
                Err(message) => message.red().to_string(),
            };
            Label::new(range)
                .with_text(text)
                .with_style(move |s| match label {
                    Ok(TokenKind::Atom) => s.blue().to_string(),
                    Ok(TokenKind::Integer) => s.yellow().to_string(),
                    Ok(TokenKind::String) => s.cyan().to_string(),
                    Ok(_) => s,
                    Err(_) => s.red().to_string(),
                })
        }),
    )
}

/// The first non-blank of `--log-level` and `RUST_LOG`.
fn log_directives<'a>(flag: Option<&'a str>, env: Option<&'a str>) -> &'a str {
    [flag, env]
        .into_iter()
        .flatten()
        .find(|directives| !directives.trim().is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER)
}

fn init_logging(flag: Option<&str>) -> anyhow::Result<()> {
    let env = std::env::var("RUST_LOG").ok();
    let directives = log_directives(flag, env.as_deref());
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|err| {
        eprintln!("{}: ignoring log filter `{directives}`: {err}", "warning".yellow().bold());
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}

/// Space-separated, sorted
fn known_operators(compiler: &Compiler<'_>) -> String {
    let mut names = compiler.operators().names().collect::<Vec<_>>();
    names.sort_unstable();
    names.join(" ")
}

fn render(name: &str, block: Block<&str, String>) -> String {
    let block = block.map_code(|c| CodeWidth::new(c, c.len()));
    format!("{}[{name}]\n{block}{}", block.prologue(), block.epilogue())
}

struct Session {
    tokenizer: Tokenizer,
    compiler: Compiler<'static>,
    max_depth: usize,
    emit: Emit,
}

impl Session {
    fn new(args: &Args) -> Self {
        Self {
            tokenizer: Tokenizer::skipping_whitespace(),
            compiler: Compiler::new().with_max_depth(args.max_depth),
            max_depth: args.max_depth,
            emit: args.emit,
        }
    }

    /// Prints what was asked for, or reports the first error. Returns whether
    /// the program got through.
    fn run(&self, name: &str, source: &str) -> bool {
        if self.emit == Emit::Tokens {
            return self.show_tokens(name, source);
        }

        let parsed = Parser::new(&self.tokenizer, source)
            .with_max_depth(self.max_depth)
            .parse_program();
        let program = match parsed {
            Ok(program) => program,
            Err(err) => {
                let idx = LineIndex::new(source);
                eprintln!("{}: {err}", "parse error".red().bold());
                if let Some(block) = make_block(&idx, [(err.span(), Err(err.to_string()))]) {
                    eprintln!("{}", render(name, block));
                }
                return false;
            }
        };

        if self.emit == Emit::Ast {
            for expr in &program {
                println!("{expr}");
            }
            return true;
        }

        let sequence = match self.compiler.compile(&program) {
            Ok(sequence) => sequence,
            Err(err) => {
                eprintln!("{}: {err}", "compile error".red().bold());
                if let CompileError::UnknownOperator { .. } = err {
                    eprintln!("  known operators: {}", known_operators(&self.compiler));
                }
                return false;
            }
        };

        match self.emit {
            Emit::Instructions => {
                println!("{sequence}");
                true
            }
            Emit::Wat => match sequence.emit(WatBackend::new(), DEFAULT_ENTRY_POINT) {
                Ok(module) => {
                    println!("{module}");
                    true
                }
                Err(err) => {
                    eprintln!("{}: {err}", "invalid module".red().bold());
                    false
                }
            },
            Emit::Result | Emit::Ast | Emit::Tokens => match execute(&sequence) {
                Ok(value) => {
                    println!("{}", value.green());
                    true
                }
                Err(trap) => {
                    eprintln!("{}: {trap}", "trap".magenta().bold());
                    false
                }
            },
        }
    }

    fn show_tokens(&self, name: &str, source: &str) -> bool {
        let idx = LineIndex::new(source);
        let mut labels = vec![];
        let mut clean = true;

        for token in self.tokenizer.tokenize(source) {
            match token {
                Ok(token) => labels.push((token.span, Ok(token.kind))),
                Err(err) => {
                    clean = false;
                    labels.push((err.span.clone(), Err(err.kind.to_string())));
                }
            }
        }

        if let Some(block) = make_block(&idx, labels) {
            println!("{}", render(name, block));
        }
        clean
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;
    let session = Session::new(&args);

    if let Some(path) = &args.file {
        let source = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let name = path.display().to_string();
        tracing::debug!(file = %name, bytes = source.len(), "compiling file");
        return Ok(if session.run(&name, &source) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut readline = rustyline::DefaultEditor::new()?;
    while let Ok(input) = readline.readline(">> ") {
        if input.trim().is_empty() {
            continue;
        }
        _ = readline.add_history_entry(input.as_str());
        session.run("repl", &input);
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::{known_operators, log_directives, DEFAULT_LOG_FILTER};
    use assert2::check;
    use claret::{BinaryOp, Compiler, Operator, OperatorTable};

    #[test]
    fn log_flag_overrides_environment() {
        check!(log_directives(Some("claret=trace"), Some("info")) == "claret=trace");
        check!(log_directives(None, Some("info")) == "info");
        check!(log_directives(Some("  "), Some("info")) == "info");
        check!(log_directives(None, Some("")) == DEFAULT_LOG_FILTER);
        check!(log_directives(None, None) == DEFAULT_LOG_FILTER);
    }

    #[test]
    fn operators_are_listed_in_order() {
        check!(known_operators(&Compiler::new()) == "* + - /");

        let mut table = OperatorTable::new();
        table.insert("sub", Operator::left_fold(BinaryOp::Sub));
        table.insert("add", Operator::left_fold(BinaryOp::Add));
        check!(known_operators(&Compiler::new().with_operators(&table)) == "add sub");
    }
}

use std::path::PathBuf;

use clap::Parser;
use schemer::{is_complete, parse_all, Interpreter, Reply, SchemeError};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A small Scheme interpreter with exact integer and rational arithmetic.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Program to run instead of starting the REPL
    file: Option<PathBuf>,

    /// Text printed before each new form
    #[arg(long, default_value = "scm> ")]
    prompt: String,

    /// Don't print the prompt
    #[arg(long)]
    quiet: bool,
}

enum Flow {
    Continue,
    Exit,
}

fn report(error: &SchemeError) {
    warn!(%error, "top-level form failed");
    println!("RuntimeError");
}

/// Evaluates every form in `source`, printing whatever the REPL echoes.
fn run_source(interpreter: &mut Interpreter, source: &str) -> Flow {
    let forms = match parse_all(source) {
        Ok(forms) => forms,
        Err(error) => {
            report(&error);
            return Flow::Continue;
        }
    };

    for form in &forms {
        match interpreter.evaluate(form) {
            Ok(Reply::Exit) => return Flow::Exit,
            Ok(Reply::Displayed) => println!(),
            Ok(reply) => {
                if let Some(output) = reply.output() { println!("{}", output); }
            }
            Err(error) => report(&error),
        }
    }

    Flow::Continue
}

async fn query(stdout: &mut io::Stdout, prompt: Option<&str>, lines: &mut io::Lines<io::BufReader<io::Stdin>>) -> io::Result<Option<String>> {
    if let Some(prompt) = prompt {
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
    }
    lines.next_line().await
}

async fn repl(interpreter: &mut Interpreter, args: &Args) -> anyhow::Result<Flow> {
    let mut lines = io::BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        // Only prompt at the start of a form, not for its continuation lines
        let prompt = (!args.quiet && buffer.trim().is_empty()).then_some(args.prompt.as_str());
        let Some(line) = query(&mut stdout, prompt, &mut lines).await? else { break };

        buffer.push_str(&line);
        buffer.push('\n');
        if !is_complete(&buffer) { continue; }

        let source = std::mem::take(&mut buffer);
        if let Flow::Exit = run_source(interpreter, &source) { return Ok(Flow::Exit); }
    }

    if buffer.trim().is_empty() { return Ok(Flow::Continue); }
    Ok(run_source(interpreter, &buffer))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut interpreter = Interpreter::new();

    let flow = match &args.file {
        Some(path) => {
            info!(path = %path.display(), "running program");
            let source = tokio::fs::read_to_string(path).await?;
            run_source(&mut interpreter, &source)
        }
        None => repl(&mut interpreter, &args).await?,
    };

    // Defines at the very end of the input still run
    if let Flow::Continue = flow {
        if let Err(error) = interpreter.flush() { report(&error); }
    }

    Ok(())
}

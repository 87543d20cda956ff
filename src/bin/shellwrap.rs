// EN: src/bin/shellwrap.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;
use shellwrap::{
    cli::Cli,
    core::config_loader,
    models::{ExecRequest, TrailingLinePolicy},
    system::session::Session,
    t,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

/// The main entry point of the `shellwrap` application.
/// It sets up logging, parses arguments, runs the session and performs centralized
/// error handling.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("\n{}: {}", t!("cli.error.label").red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Opens the session, runs the requested command(s) and returns the process exit code.
fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut config = match &cli.config {
        Some(path) => config_loader::load_config_from(path)?,
        None => config_loader::load_config()?,
    };
    if cli.drop_partial {
        config.trailing_line = TrailingLinePolicy::Drop;
    }

    let env_pairs = cli
        .env_pairs()
        .map_err(|entry| anyhow!(t!("cli.error.invalid_env"), entry = entry))?;

    let mut session = Session::open_with(config)?;

    let code = if cli.interactive {
        run_interactive(&mut session, &cli, &env_pairs)?
    } else {
        let request = match &cli.command {
            Some(line) => ExecRequest::parse(line)?,
            None if !cli.tokens.is_empty() => ExecRequest::new(cli.tokens.iter().cloned())?,
            None => return Err(anyhow!(t!("cli.error.no_command"))),
        };
        run_one(&mut session, request, &cli, &env_pairs)?
    };

    session.close();
    Ok(code)
}

/// Applies the command-line overrides shared by every request.
fn prepare(request: ExecRequest, cli: &Cli, env_pairs: &[(String, String)]) -> ExecRequest {
    let request = request.envs(env_pairs.iter().cloned());
    match cli.timeout {
        Some(secs) => request.timeout(Duration::from_secs(secs)),
        None => request,
    }
}

fn run_one(
    session: &mut Session,
    request: ExecRequest,
    cli: &Cli,
    env_pairs: &[(String, String)],
) -> Result<i32> {
    let request = prepare(request, cli, env_pairs);
    let outcome = session.execute(
        &request,
        |line: &str| println!("{}", line),
        |line: &str| eprintln!("{}", line.red()),
    )?;
    log::debug!("'{}' {}", request.display_line(), outcome);
    Ok(outcome.shell_status())
}

/// Reads one command line per stdin line until EOF or `exit`, running each in the
/// same session. Returns the status of the last command.
fn run_interactive(
    session: &mut Session,
    cli: &Cli,
    env_pairs: &[(String, String)],
) -> Result<i32> {
    let show_prompt = io::stdin().is_terminal();
    if show_prompt {
        println!(
            "{}",
            format!(
                t!("interactive.info.started"),
                pid = session.interpreter_pid().unwrap_or_default()
            )
            .dimmed()
        );
    }

    let mut last_status = 0;
    let mut input = io::stdin().lock();
    loop {
        if show_prompt {
            print!("{}", t!("interactive.prompt"));
            io::stdout().flush()?;
        }

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        let request = match ExecRequest::parse(line) {
            Ok(request) => prepare(request, cli, env_pairs),
            Err(e) => {
                eprintln!("{}: {}", t!("cli.error.label").red().bold(), e);
                last_status = 1;
                continue;
            }
        };

        let outcome = session.execute(
            &request,
            |line: &str| println!("{}", line),
            |line: &str| eprintln!("{}", line.red()),
        )?;
        if !outcome.success() {
            eprintln!(
                "{}",
                format!(t!("exec.warn.failed"), outcome = outcome).yellow()
            );
        }
        last_status = outcome.shell_status();
    }

    if show_prompt {
        println!("{}", t!("interactive.info.closed").dimmed());
    }
    Ok(last_status)
}

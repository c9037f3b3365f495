use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};

use protoscript::config::Config;
use protoscript::{NoData, OperationRegistry, ParsingContext, Protocol, validate_protocol};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let config = Config::from_args_and_env()?;

    // RUST_LOG wins over --log-level
    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .parse_env("RUST_LOG")
        .init();

    let registry = OperationRegistry::load(&config)?;
    let naming = registry.naming_rules();
    let text = fs::read_to_string(&config.file)
        .with_context(|| format!("Failed to read protocol file {:?}", config.file))?;
    let mut protocol = Protocol::with_text(ParsingContext::new(&registry, &NoData, &naming), &text);

    if let Some(n) = config.line {
        return print_command(&mut protocol, n, config.json);
    }
    if let Some(n) = config.types_at {
        let types = protocol.type_state_at_line(n);
        if config.json {
            println!("{}", serde_json::to_string_pretty(&types)?);
        } else {
            for (name, ty) in types.iter() {
                println!("{}: {}", name, ty);
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let result = validate_protocol(&mut protocol);
    if config.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for diagnostic in &result.diagnostics {
            println!("{}", diagnostic);
        }
    }
    Ok(if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Parse one line after replaying the lines before it
fn print_command(protocol: &mut Protocol<'_>, n: usize, json: bool) -> Result<ExitCode> {
    match protocol.parse_single_command(n, true) {
        Ok(Some(task)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("{}", protocol.render(&task)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            println!("line {}: [error] {}", err.line.unwrap_or(n), err.plain_message());
            Ok(ExitCode::from(1))
        }
    }
}

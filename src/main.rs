use nanodb::{load_config, DbController, NanoDbError, Result, Value};
use std::io::Write;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: nanodb [--debug] <config.toml> <sql> [name=value ...]";

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber; stdout is reserved for rows
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let debug = match args.iter().position(|a| a == "--debug") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    if args.len() < 2 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    match run(&args[0], &args[1], &args[2..], debug) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str, sql: &str, bindings: &[String], debug: bool) -> Result<()> {
    let config = load_config(config_path)?;
    info!("Starting nanodb against {}", config.dsn());

    let mut db = DbController::with_debug(config, debug)?;
    if !db.is_connected() {
        return Err(NanoDbError::Connection(db.last_error().map(String::from)));
    }

    db.prepare(sql)?;
    for binding in bindings {
        let (name, literal) = binding.split_once('=').ok_or_else(|| {
            NanoDbError::Config(format!("invalid binding {:?}, expected name=value", binding))
        })?;
        db.bind(name, Value::parse_literal(literal))?;
    }
    db.execute()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if db.column_count()? == 0 {
        writeln!(out, "rows affected: {}", db.row_count()?)?;
        writeln!(out, "last insert id: {}", db.get_last_insert_id()?)?;
    } else {
        for row in db.get_all()? {
            serde_json::to_writer(&mut out, &row)?;
            writeln!(out)?;
        }
    }

    db.close();
    Ok(())
}

//! Purpose: `mdbq` CLI entry point and argument surface.
//! Role: Binary crate root; parses args, runs commands, emits results on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All database reads go through `api::Database` (mdbtools subprocesses).

use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use mdbq::api::{Database, Error, ErrorKind, HeaderMode, SqlFlavor, Toolchain, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)));
            }
        },
    };

    let mut toolchain = Toolchain::new();
    if let Some(dir) = cli.mdbtools_path {
        toolchain = toolchain.with_bin_dir(dir);
    }

    command_dispatch::dispatch_command(cli.command, toolchain)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "mdbq",
    version,
    about = "Read Microsoft Access .mdb files through the mdbtools suite",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Every command shells out to an installed mdbtools executable
(mdb-ver, mdb-tables, mdb-export, mdb-sql, mdb-schema) and restructures
its text output. Nothing here parses the binary MDB format.
"#,
    after_help = r#"EXAMPLES
  $ mdbq tables legacy.mdb
  $ mdbq data legacy.mdb Orders | jq '.CustomerID'
  $ mdbq data legacy.mdb Orders --query "SELECT * FROM Orders WHERE Qty > 3"
  $ mdbq schema legacy.mdb --flavor postgres > schema.sql

LEARN MORE
  $ mdbq <command> --help
  https://github.com/sandover/mdbq"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory holding the mdbtools executables (default: search PATH)",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    mdbtools_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SqlFlavorCli {
    Access,
    Mysql,
    Oracle,
    Postgres,
    Sqlite,
    Sybase,
}

impl From<SqlFlavorCli> for SqlFlavor {
    fn from(value: SqlFlavorCli) -> Self {
        match value {
            SqlFlavorCli::Access => SqlFlavor::Access,
            SqlFlavorCli::Mysql => SqlFlavor::MySql,
            SqlFlavorCli::Oracle => SqlFlavor::Oracle,
            SqlFlavorCli::Postgres => SqlFlavor::Postgres,
            SqlFlavorCli::Sqlite => SqlFlavor::Sqlite,
            SqlFlavorCli::Sybase => SqlFlavor::Sybase,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "List the tables in a database",
        after_help = r#"EXAMPLES
  $ mdbq tables legacy.mdb
  $ mdbq tables legacy.mdb --json

NOTES
  - System tables are whatever mdb-tables reports; no filtering is applied."#
    )]
    Tables {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, help = "Emit JSON instead of one name per line")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "List one table's columns in export order",
        after_help = r#"EXAMPLES
  $ mdbq columns legacy.mdb Orders
  $ mdbq columns legacy.mdb Orders --json"#
    )]
    Columns {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(help = "Table name")]
        table: String,
        #[arg(long, help = "Emit JSON instead of one name per line")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print a table's rows as JSON records",
        long_about = r#"Print a table's rows as JSON records, one object per line.

Keys follow the table's physical column order. With --query the rows come
from mdb-sql instead of a full table export; column names still come from
the table itself."#,
        after_help = r#"EXAMPLES
  $ mdbq data legacy.mdb Orders
  $ mdbq data legacy.mdb Orders --array > orders.json
  $ mdbq data legacy.mdb Orders --query "SELECT * FROM Orders WHERE Region = 'EMEA'"
  $ mdbq data legacy.mdb Orders --limit 10

NOTES
  - NULL and empty text both surface as "" (the export cannot tell them apart).
  - A mismatched row width aborts with RowShapeMismatch rather than guessing."#
    )]
    Data {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(help = "Table name")]
        table: String,
        #[arg(long, value_name = "SQL", help = "Run this query through mdb-sql instead of exporting the whole table")]
        query: Option<String>,
        #[arg(long, help = "Emit one JSON array instead of one object per line")]
        array: bool,
        #[arg(long, value_name = "N", help = "Emit at most N records")]
        limit: Option<usize>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print a table's raw CSV export",
        after_help = r#"EXAMPLES
  $ mdbq export legacy.mdb Orders > orders.csv
  $ mdbq export legacy.mdb Orders --no-headers"#
    )]
    Export {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(help = "Table name")]
        table: String,
        #[arg(long, help = "Drop the leading header line")]
        no_headers: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print a table's contents as SQL INSERT statements",
        after_help = r#"EXAMPLES
  $ mdbq sql legacy.mdb Orders
  $ mdbq sql legacy.mdb Orders --flavor sqlite | sqlite3 orders.db"#
    )]
    Sql {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(help = "Table name")]
        table: String,
        #[arg(long, value_enum, default_value = "mysql", help = "SQL dialect for the statements")]
        flavor: SqlFlavorCli,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print CREATE TABLE schema for the database or one table",
        after_help = r#"EXAMPLES
  $ mdbq schema legacy.mdb
  $ mdbq schema legacy.mdb --table Orders --flavor postgres"#
    )]
    Schema {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, help = "Limit output to this table")]
        table: Option<String>,
        #[arg(long, value_enum, default_value = "mysql", help = "SQL dialect for the schema")]
        flavor: SqlFlavorCli,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print the MDB file format version",
        after_help = r#"EXAMPLES
  $ mdbq version legacy.mdb
  $ mdbq version legacy.mdb --json"#
    )]
    Version {
        #[arg(help = "Path to the .mdb file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, help = "Emit JSON instead of the bare version string")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ mdbq completion bash > ~/.local/share/bash-completion/completions/mdbq
  $ mdbq completion zsh > ~/.zfunc/_mdbq"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn open_database(file: PathBuf, toolchain: Toolchain) -> Result<Database, Error> {
    Database::open_with_toolchain(file, toolchain)
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, is_tty));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::ToolFailure => "external tool failed".to_string(),
        ErrorKind::MalformedExport => "malformed export".to_string(),
        ErrorKind::RowShapeMismatch => "row width mismatch".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(tool) = err.tool() {
        inner.insert("tool".to_string(), json!(tool));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    if let Some(query) = err.query() {
        inner.insert("query".to_string(), json!(query));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(tool) = err.tool() {
        lines.push(format!(
            "{} {tool}",
            colorize_label("tool:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("file:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(table) = err.table() {
        lines.push(format!(
            "{} {table}",
            colorize_label("table:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(query) = err.query() {
        lines.push(format!(
            "{} {query}",
            colorize_label("query:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

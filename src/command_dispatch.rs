//! Purpose: Hold top-level CLI command dispatch for `mdbq`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command output shapes and exit code semantics stay unchanged.

use super::*;

pub(super) fn dispatch_command(command: Command, toolchain: Toolchain) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "mdbq", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Tables { file, json } => {
            let db = open_database(file, toolchain)?;
            let tables = db.tables()?;
            if json {
                emit_json(json!({ "tables": tables }));
            } else {
                for table in &tables {
                    println!("{table}");
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Columns { file, table, json } => {
            let db = open_database(file, toolchain)?;
            let columns = db.columns(&table)?;
            if json {
                emit_json(json!({ "table": table, "columns": columns }));
            } else {
                for column in &columns {
                    println!("{column}");
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Data {
            file,
            table,
            query,
            array,
            limit,
        } => {
            let db = open_database(file, toolchain)?;
            let records = match query {
                Some(sql) => db.query_records(&table, &sql)?,
                None => db.records(&table)?,
            };
            let limit = limit.unwrap_or(usize::MAX);
            if array {
                let kept: Vec<_> = records.iter().take(limit).collect();
                println!("{}", encode_json(&kept)?);
            } else {
                for record in records.iter().take(limit) {
                    println!("{}", encode_json(record)?);
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Export {
            file,
            table,
            no_headers,
        } => {
            let db = open_database(file, toolchain)?;
            let headers = if no_headers {
                HeaderMode::Omitted
            } else {
                HeaderMode::Included
            };
            println!("{}", db.export_csv(&table, headers)?);
            Ok(RunOutcome::ok())
        }
        Command::Sql {
            file,
            table,
            flavor,
        } => {
            let db = open_database(file, toolchain)?;
            println!("{}", db.insert_statements(&table, flavor.into())?);
            Ok(RunOutcome::ok())
        }
        Command::Schema {
            file,
            table,
            flavor,
        } => {
            let db = open_database(file, toolchain)?;
            let ddl = match table {
                Some(table) => db.table_schema(&table, flavor.into())?,
                None => db.schema(flavor.into())?,
            };
            println!("{ddl}");
            Ok(RunOutcome::ok())
        }
        Command::Version { file, json } => {
            let db = open_database(file, toolchain)?;
            let version = db.version()?;
            if json {
                emit_json(json!({
                    "file": db.path().display().to_string(),
                    "format": version,
                }));
            } else {
                println!("{version}");
            }
            Ok(RunOutcome::ok())
        }
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })
}

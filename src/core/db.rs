//! Purpose: Operations on one .mdb file, each backed by an mdbtools executable.
//! Exports: `Database`, `SqlFlavor`, `HeaderMode`.
//! Role: The binding surface; delegates reading to mdbtools, decoding to `decode`.
//! Invariants: Every operation reads the file through a subprocess; nothing here
//! parses the binary MDB format.
//! Invariants: Decode failures always carry the table or query they came from.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::decode::{self, RecordSet};
use crate::core::error::{Error, ErrorKind};
use crate::core::exec::Toolchain;

/// Date rendering passed to `mdb-export -D`, `strftime`-style.
pub const EXPORT_DATE_FORMAT: &str = "%F %T";

/// SQL dialects understood by `mdb-schema` and `mdb-export -I`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SqlFlavor {
    Access,
    #[default]
    MySql,
    Oracle,
    Postgres,
    Sqlite,
    Sybase,
}

impl SqlFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlFlavor::Access => "access",
            SqlFlavor::MySql => "mysql",
            SqlFlavor::Oracle => "oracle",
            SqlFlavor::Postgres => "postgres",
            SqlFlavor::Sqlite => "sqlite",
            SqlFlavor::Sybase => "sybase",
        }
    }
}

impl fmt::Display for SqlFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a CSV export keeps the leading header line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum HeaderMode {
    #[default]
    Included,
    Omitted,
}

/// Handle to one Access database file plus the toolchain that reads it.
#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
    toolchain: Toolchain,
}

impl Database {
    /// Open a database with tools resolved through `PATH`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Self::open_with_toolchain(path, Toolchain::new())
    }

    /// Open a database with an explicit mdbtools location.
    pub fn open_with_toolchain(
        path: impl Into<PathBuf>,
        toolchain: Toolchain,
    ) -> Result<Self, Error> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("database file not found")
                .with_path(&path)
                .with_hint("Check the path; mdbq never creates .mdb files."));
        }
        Ok(Self { path, toolchain })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// MDB file format version, from `mdb-ver`.
    pub fn version(&self) -> Result<String, Error> {
        let lines = self.run("mdb-ver", [self.path.as_os_str()], None)?;
        Ok(lines.join("\n"))
    }

    /// Table names, one per `mdb-tables -1` output line.
    pub fn tables(&self) -> Result<Vec<String>, Error> {
        let args = [OsStr::new("-1"), self.path.as_os_str()];
        let lines = self.run("mdb-tables", args, None)?;
        Ok(lines.into_iter().filter(|line| !line.is_empty()).collect())
    }

    /// One table's contents as raw CSV text, exactly as `mdb-export` emits it.
    pub fn export_csv(&self, table: &str, headers: HeaderMode) -> Result<String, Error> {
        Ok(self.export_lines(table, headers)?.join("\n"))
    }

    /// One table's column names, in physical export order.
    pub fn columns(&self, table: &str) -> Result<Vec<String>, Error> {
        let lines = self.export_lines(table, HeaderMode::Included)?;
        decode::decode_columns(&lines).map_err(|err| err.with_table(table))
    }

    /// One table's rows as records. One export invocation supplies both the
    /// header line and the data rows.
    pub fn records(&self, table: &str) -> Result<RecordSet, Error> {
        let lines = self.export_lines(table, HeaderMode::Included)?;
        let columns = decode::decode_columns(&lines).map_err(|err| err.with_table(table))?;
        decode::decode_records(&lines, &columns, decode::TABLE_OFFSET)
            .map_err(|err| err.with_table(table))
    }

    /// Rows selected by an ad-hoc SQL query run through `mdb-sql`. Column
    /// names still come from the table's own export header; the query result
    /// carries an extra preface line, hence the larger offset.
    pub fn query_records(&self, table: &str, sql: &str) -> Result<RecordSet, Error> {
        let columns = self.columns(table)?;
        let args = [
            OsStr::new("-p"),
            OsStr::new("-F"),
            OsStr::new("-d"),
            OsStr::new(","),
            self.path.as_os_str(),
        ];
        let payload = format!("{sql}\n");
        let lines = self.run("mdb-sql", args, Some(&payload))?;
        decode::decode_records(&lines, &columns, decode::QUERY_OFFSET)
            .map_err(|err| err.with_query(sql))
    }

    /// One table's contents as SQL INSERT statements, from `mdb-export -I`.
    pub fn insert_statements(&self, table: &str, flavor: SqlFlavor) -> Result<String, Error> {
        let args = [
            OsStr::new("-I"),
            OsStr::new(flavor.as_str()),
            OsStr::new("-D"),
            OsStr::new(EXPORT_DATE_FORMAT),
            self.path.as_os_str(),
            OsStr::new(table),
        ];
        let lines = self.run("mdb-export", args, None)?;
        Ok(lines.join("\n"))
    }

    /// DDL for one table, from `mdb-schema -T`.
    pub fn table_schema(&self, table: &str, flavor: SqlFlavor) -> Result<String, Error> {
        let args = [
            OsStr::new("-T"),
            OsStr::new(table),
            self.path.as_os_str(),
            OsStr::new(flavor.as_str()),
        ];
        let lines = self.run("mdb-schema", args, None)?;
        Ok(lines.join("\n"))
    }

    /// DDL for the whole database, from `mdb-schema`.
    pub fn schema(&self, flavor: SqlFlavor) -> Result<String, Error> {
        let args = [self.path.as_os_str(), OsStr::new(flavor.as_str())];
        let lines = self.run("mdb-schema", args, None)?;
        Ok(lines.join("\n"))
    }

    fn export_lines(&self, table: &str, headers: HeaderMode) -> Result<Vec<String>, Error> {
        let mut args: Vec<&OsStr> = Vec::new();
        if headers == HeaderMode::Omitted {
            args.push(OsStr::new("-H"));
        }
        args.push(OsStr::new("-D"));
        args.push(OsStr::new(EXPORT_DATE_FORMAT));
        args.push(self.path.as_os_str());
        args.push(OsStr::new(table));
        self.run("mdb-export", args, None)
            .map_err(|err| err.with_table(table))
    }

    fn run<'a, I>(&self, tool: &str, args: I, stdin: Option<&str>) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        self.toolchain
            .run(tool, args, stdin)
            .map_err(|err| err.with_path(&self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, HeaderMode, SqlFlavor};
    use crate::core::error::ErrorKind;

    #[test]
    fn open_missing_file_is_not_found() {
        let err = Database::open("/no/such/dir/legacy.mdb").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.hint().is_some());
    }

    #[test]
    fn flavor_names_match_mdbtools_backends() {
        let cases = [
            (SqlFlavor::Access, "access"),
            (SqlFlavor::MySql, "mysql"),
            (SqlFlavor::Oracle, "oracle"),
            (SqlFlavor::Postgres, "postgres"),
            (SqlFlavor::Sqlite, "sqlite"),
            (SqlFlavor::Sybase, "sybase"),
        ];
        for (flavor, name) in cases {
            assert_eq!(flavor.as_str(), name);
        }
    }

    #[test]
    fn default_flavor_is_mysql() {
        assert_eq!(SqlFlavor::default(), SqlFlavor::MySql);
    }

    #[test]
    fn header_mode_defaults_to_included() {
        assert_eq!(HeaderMode::default(), HeaderMode::Included);
    }
}

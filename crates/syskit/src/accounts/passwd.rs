//! Colon-delimited account databases (`passwd`, `shadow`, `group`).
//!
//! Each file is a [`Table`] of typed records. Lines that are not records
//! (comments, NIS `+`/`-` entries) are carried through untouched.

use crate::error::{Error, Result};
use std::fmt::Write;
use std::path::Path;

/// One record type of an account database.
pub trait Record: Sized {
    /// Number of colon-separated fields.
    const FIELDS: usize;

    fn from_fields(fields: &[&str]) -> std::result::Result<Self, String>;
    fn to_line(&self) -> String;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Row<R> {
    Record(R),
    Raw(String),
}

/// An account database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<R> {
    rows: Vec<Row<R>>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: Record> Table<R> {
    /// Parse a database file. A missing file parses as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let content = crate::swap::read_or_empty(path)?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let mut rows = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(['#', '+', '-']) {
                rows.push(Row::Raw(line.to_string()));
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != R::FIELDS {
                return Err(Error::Parse {
                    path: origin.to_path_buf(),
                    line: line_num + 1,
                    message: format!("expected {} fields, found {}", R::FIELDS, fields.len()),
                });
            }
            let record = R::from_fields(&fields).map_err(|message| Error::Parse {
                path: origin.to_path_buf(),
                line: line_num + 1,
                message,
            })?;
            rows.push(Row::Record(record));
        }
        Ok(Self { rows })
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        for row in &self.rows {
            let _ = match row {
                Row::Record(record) => writeln!(output, "{}", record.to_line()),
                Row::Raw(line) => writeln!(output, "{line}"),
            };
        }
        output
    }

    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.rows.iter().filter_map(|row| match row {
            Row::Record(record) => Some(record),
            Row::Raw(_) => None,
        })
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut R> {
        self.rows.iter_mut().filter_map(|row| match row {
            Row::Record(record) => Some(record),
            Row::Raw(_) => None,
        })
    }

    pub fn find(&self, name: &str) -> Option<&R> {
        self.records().find(|r| r.name() == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut R> {
        self.records_mut().find(|r| r.name() == name)
    }

    pub fn push(&mut self, record: R) {
        self.rows.push(Row::Record(record));
    }

    /// Drop records for which `keep` is false.
    pub fn retain(&mut self, mut keep: impl FnMut(&R) -> bool) {
        self.rows.retain(|row| match row {
            Row::Record(record) => keep(record),
            Row::Raw(_) => true,
        });
    }
}

fn id(field: &str, what: &str) -> std::result::Result<u32, String> {
    field
        .parse()
        .map_err(|_| format!("{what} '{field}' is not a number"))
}

/// A `passwd` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub password: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub home: String,
    pub shell: String,
}

impl Record for PasswdEntry {
    const FIELDS: usize = 7;

    fn from_fields(f: &[&str]) -> std::result::Result<Self, String> {
        Ok(Self {
            name: f[0].to_string(),
            password: f[1].to_string(),
            uid: id(f[2], "uid")?,
            gid: id(f[3], "gid")?,
            gecos: f[4].to_string(),
            home: f[5].to_string(),
            shell: f[6].to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, self.password, self.uid, self.gid, self.gecos, self.home, self.shell
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A `shadow` record. Aging fields are kept as text; empty means unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowEntry {
    pub name: String,
    pub hash: String,
    pub last_change: String,
    pub min: String,
    pub max: String,
    pub warn: String,
    pub inactive: String,
    pub expire: String,
    pub reserved: String,
}

impl ShadowEntry {
    /// Hash stored for an account without a password.
    pub const LOCKED: &'static str = "!";

    /// A new record with the default aging policy.
    pub fn new(name: impl Into<String>, hash: Option<&str>) -> Self {
        Self {
            name: name.into(),
            hash: hash.unwrap_or(Self::LOCKED).to_string(),
            last_change: String::new(),
            min: "0".to_string(),
            max: "99999".to_string(),
            warn: "7".to_string(),
            inactive: String::new(),
            expire: String::new(),
            reserved: String::new(),
        }
    }

    /// The usable password hash, or `None` when locked or empty.
    pub fn password(&self) -> Option<&str> {
        match self.hash.as_str() {
            "" | "!" | "!!" | "*" => None,
            hash => Some(hash),
        }
    }
}

impl Record for ShadowEntry {
    const FIELDS: usize = 9;

    fn from_fields(f: &[&str]) -> std::result::Result<Self, String> {
        Ok(Self {
            name: f[0].to_string(),
            hash: f[1].to_string(),
            last_change: f[2].to_string(),
            min: f[3].to_string(),
            max: f[4].to_string(),
            warn: f[5].to_string(),
            inactive: f[6].to_string(),
            expire: f[7].to_string(),
            reserved: f[8].to_string(),
        })
    }

    fn to_line(&self) -> String {
        [
            self.name.as_str(),
            self.hash.as_str(),
            self.last_change.as_str(),
            self.min.as_str(),
            self.max.as_str(),
            self.warn.as_str(),
            self.inactive.as_str(),
            self.expire.as_str(),
            self.reserved.as_str(),
        ]
        .join(":")
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A `group` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub password: String,
    pub gid: u32,
    pub members: Vec<String>,
}

impl Record for GroupEntry {
    const FIELDS: usize = 4;

    fn from_fields(f: &[&str]) -> std::result::Result<Self, String> {
        Ok(Self {
            name: f[0].to_string(),
            password: f[1].to_string(),
            gid: id(f[2], "gid")?,
            members: f[3]
                .split(',')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.name,
            self.password,
            self.gid,
            self.members.join(",")
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}

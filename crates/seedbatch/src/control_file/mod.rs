//! Simulator control file rewriting
//!
//! The control file is line-oriented; assignments have the shape
//! `KEY = VALUE`. Only assignments whose key contains one of the recognised
//! substrings are rewritten:
//!
//! | key contains             | new value                  |
//! |--------------------------|----------------------------|
//! | `Seed`                   | seed, integer              |
//! | `BeamParticle`           | particle, double-quoted    |
//! | `BeamEnergy`             | energy followed by ` MeV`  |
//! | `NumberOfHistoriesInRun` | histories, integer         |
//!
//! Everything else (comments, blanks, unrelated parameters) is written back
//! byte for byte and in its original order.
//!
//! The whole file is read, then overwritten in one `fs::write`. A crash
//! during the write can leave a truncated control file.

use crate::error::ControlFileError;
use crate::types::RunParameters;
use std::fs;
use std::path::Path;

/// Parameters the writer knows how to substitute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Seed,
    BeamParticle,
    BeamEnergy,
    Histories,
}

impl ControlKey {
    /// Recognition table, checked in order; first match wins
    pub const TABLE: [(&'static str, ControlKey); 4] = [
        ("Seed", ControlKey::Seed),
        ("BeamParticle", ControlKey::BeamParticle),
        ("BeamEnergy", ControlKey::BeamEnergy),
        ("NumberOfHistoriesInRun", ControlKey::Histories),
    ];

    /// Match the left-hand side of an assignment against the table
    #[must_use]
    pub fn recognize(key: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(needle, _)| key.contains(needle))
            .map(|(_, k)| *k)
    }

    /// Rendered right-hand side for this key
    #[must_use]
    pub fn render(self, params: &RunParameters) -> String {
        match self {
            Self::Seed => params.seed.to_string(),
            Self::BeamParticle => format!("\"{}\"", params.particle),
            Self::BeamEnergy => format!("{} MeV", params.energy),
            Self::Histories => params.histories.to_string(),
        }
    }
}

/// Result of one rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub contents: String,
    /// Total number of lines
    pub lines: usize,
    /// Lines whose value was substituted
    pub substituted: usize,
}

/// Rewrite the control file at `path` in place.
///
/// # Errors
/// [`ControlFileError::Read`] if the file cannot be read,
/// [`ControlFileError::Write`] if it cannot be overwritten.
pub fn apply(path: &Path, params: &RunParameters) -> Result<Rewrite, ControlFileError> {
    let original = fs::read_to_string(path).map_err(|source| ControlFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let rewrite = rewrite(&original, params);
    if rewrite.substituted == 0 {
        tracing::warn!(
            "Control file {} has no recognised parameter lines",
            path.display()
        );
    }

    fs::write(path, &rewrite.contents).map_err(|source| ControlFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Rewrote {} ({} of {} lines substituted, seed {})",
        path.display(),
        rewrite.substituted,
        rewrite.lines,
        params.seed
    );
    Ok(rewrite)
}

/// Pure rewrite of control-file text; line endings are preserved per line.
#[must_use]
pub fn rewrite(contents: &str, params: &RunParameters) -> Rewrite {
    let mut out = String::with_capacity(contents.len() + 64);
    let mut lines = 0;
    let mut substituted = 0;

    for raw in contents.split_inclusive('\n') {
        lines += 1;
        let (body, ending) = split_ending(raw);
        match rewrite_line(body, params) {
            Some(line) => {
                substituted += 1;
                out.push_str(&line);
            }
            None => out.push_str(body),
        }
        out.push_str(ending);
    }

    Rewrite {
        contents: out,
        lines,
        substituted,
    }
}

fn split_ending(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

fn rewrite_line(line: &str, params: &RunParameters) -> Option<String> {
    if line.trim_start().starts_with('#') {
        return None;
    }
    let (key, _) = line.split_once('=')?;
    let control_key = ControlKey::recognize(key)?;
    Some(format!("{} = {}", key.trim_end(), control_key.render(params)))
}

//! Parameter records, mix modes, and the text tables they are loaded from.
//!
//! A `ParameterRecord` is the fully-resolved parameter set a pattern compiles
//! with. `ParameterOverrides` is the partial form found inline on patterns and
//! in table rows; missing fields fall back to defaults one at a time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Default match threshold for the condition gate.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;
/// Default update probability (always apply).
pub const DEFAULT_UPDATE_PROBABILITY: f64 = 1.0;

/// Errors raised while reading parameter values and table rows.
///
/// These never abort resolution: callers log them and degrade to defaults.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// An 8-bit code was not eight `0`/`1` characters.
    #[error("line {line}: invalid 8-bit code `{value}`")]
    BadCode { line: usize, value: String },
    /// A field value could not be parsed.
    #[error("line {line}: invalid value `{value}` for `{field}`")]
    BadField {
        line: usize,
        field: &'static str,
        value: String,
    },
    /// An unknown parameter name.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// The row has fewer columns than required.
    #[error("line {line}: expected at least {expected} columns")]
    ShortRow { line: usize, expected: usize },
    /// The resource could not be read.
    #[error("cannot read table `{path}`: {reason}")]
    Io { path: String, reason: String },
}

/// An 8-bit pattern code (exotype), written MSB first as `"01101010"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExoCode(pub u8);

impl ExoCode {
    /// Returns bit `i` (bit 0 is the least significant).
    pub fn bit(self, i: u8) -> bool {
        (self.0 >> (i & 7)) & 1 == 1
    }
}

impl fmt::Display for ExoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.0)
    }
}

impl FromStr for ExoCode {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 8 || !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(TableError::BadCode {
                line: 0,
                value: s.to_string(),
            });
        }
        u8::from_str_radix(s, 2).map(ExoCode).map_err(|_| TableError::BadCode {
            line: 0,
            value: s.to_string(),
        })
    }
}

impl Serialize for ExoCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExoCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Strategy selecting which mixer realizes a pattern's action path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum MixMode {
    #[default]
    None,
    RotateLeft,
    RotateRight,
    Reverse,
    XorNeighbor,
    Scramble,
    Majority,
    SwapHalves,
}

impl MixMode {
    pub const ALL: [MixMode; 8] = [
        MixMode::None,
        MixMode::RotateLeft,
        MixMode::RotateRight,
        MixMode::Reverse,
        MixMode::XorNeighbor,
        MixMode::Scramble,
        MixMode::Majority,
        MixMode::SwapHalves,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MixMode::None => "none",
            MixMode::RotateLeft => "rotate-left",
            MixMode::RotateRight => "rotate-right",
            MixMode::Reverse => "reverse",
            MixMode::XorNeighbor => "xor-neighbor",
            MixMode::Scramble => "scramble",
            MixMode::Majority => "majority",
            MixMode::SwapHalves => "swap-halves",
        }
    }

    /// Parses a mix-mode name; unrecognised names fall back to `None`.
    pub fn parse_lenient(s: &str) -> MixMode {
        let key = s.trim().trim_start_matches(':');
        match MixMode::ALL.into_iter().find(|m| m.name() == key) {
            Some(mode) => mode,
            None => {
                tracing::debug!(mix_mode = key, "unrecognized mix-mode, using identity");
                MixMode::None
            }
        }
    }
}

impl fmt::Display for MixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for MixMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for MixMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(MixMode::parse_lenient(&s))
    }
}

/// Category-theoretic preservation tag carried by a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preservation {
    Full,
    #[default]
    Partial,
    None,
}

impl FromStr for Preservation {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(':') {
            "full" => Ok(Preservation::Full),
            "partial" => Ok(Preservation::Partial),
            "none" => Ok(Preservation::None),
            other => Err(TableError::BadField {
                line: 0,
                field: "preservation",
                value: other.to_string(),
            }),
        }
    }
}

/// Where a pattern's parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Parameters written inline on the pattern.
    Inline,
    /// Keyed table entry found via the pattern's own code.
    Table,
    /// Keyed table entry found via a bridged code.
    FallbackTable,
    /// Hard defaults.
    Default,
}

impl Provenance {
    pub fn name(self) -> &'static str {
        match self {
            Provenance::Inline => "inline",
            Provenance::Table => "table",
            Provenance::FallbackTable => "fallback-table",
            Provenance::Default => "default",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully-resolved compilation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ParameterRecord {
    pub rotation: u32,
    pub match_threshold: f64,
    pub update_probability: f64,
    pub mix_mode: MixMode,
    pub invert_on_secondary: bool,
}

impl Default for ParameterRecord {
    fn default() -> Self {
        Self {
            rotation: 0,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            update_probability: DEFAULT_UPDATE_PROBABILITY,
            mix_mode: MixMode::None,
            invert_on_secondary: false,
        }
    }
}

/// Partial parameter set; `None` fields take defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ParameterOverrides {
    pub rotation: Option<u32>,
    pub match_threshold: Option<f64>,
    pub update_probability: Option<f64>,
    pub mix_mode: Option<MixMode>,
    pub invert_on_secondary: Option<bool>,
}

impl ParameterOverrides {
    /// Sets one field from its text form.
    ///
    /// Reals are clamped to `[0, 1]`; a clamp is logged, not rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), TableError> {
        let value = value.trim();
        let bad = |field: &'static str| TableError::BadField {
            line: 0,
            field,
            value: value.to_string(),
        };
        match key.trim().trim_start_matches(':') {
            "rotation" => self.rotation = Some(value.parse().map_err(|_| bad("rotation"))?),
            "match-threshold" => {
                let v: f64 = value.parse().map_err(|_| bad("match-threshold"))?;
                self.match_threshold = Some(clamp_unit("match-threshold", v));
            }
            "update-probability" => {
                let v: f64 = value.parse().map_err(|_| bad("update-probability"))?;
                self.update_probability = Some(clamp_unit("update-probability", v));
            }
            "mix-mode" => self.mix_mode = Some(MixMode::parse_lenient(value)),
            "invert-on-secondary" => {
                self.invert_on_secondary = Some(parse_bool(value).ok_or_else(|| bad("invert-on-secondary"))?)
            }
            other => return Err(TableError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }

    /// Completes the record, applying per-field defaults.
    pub fn complete(&self) -> ParameterRecord {
        let d = ParameterRecord::default();
        ParameterRecord {
            rotation: self.rotation.unwrap_or(d.rotation),
            match_threshold: self.match_threshold.unwrap_or(d.match_threshold),
            update_probability: self.update_probability.unwrap_or(d.update_probability),
            mix_mode: self.mix_mode.unwrap_or(d.mix_mode),
            invert_on_secondary: self.invert_on_secondary.unwrap_or(d.invert_on_secondary),
        }
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == ParameterOverrides::default()
    }
}

impl From<ParameterRecord> for ParameterOverrides {
    fn from(r: ParameterRecord) -> Self {
        Self {
            rotation: Some(r.rotation),
            match_threshold: Some(r.match_threshold),
            update_probability: Some(r.update_probability),
            mix_mode: Some(r.mix_mode),
            invert_on_secondary: Some(r.invert_on_secondary),
        }
    }
}

fn clamp_unit(field: &str, v: f64) -> f64 {
    if v.is_nan() {
        warn!(field, "NaN parameter, using 0");
        return 0.0;
    }
    let c = v.clamp(0.0, 1.0);
    if c != v {
        warn!(field, value = v, clamped = c, "parameter out of [0, 1], clamped");
    }
    c
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn with_line(err: TableError, line: usize) -> TableError {
    match err {
        TableError::BadCode { value, .. } => TableError::BadCode { line, value },
        TableError::BadField { field, value, .. } => TableError::BadField { line, field, value },
        other => other,
    }
}

/// Column names of the keyed parameter table, after the code column.
const PARAM_COLUMNS: [&str; 5] = [
    "rotation",
    "match-threshold",
    "update-probability",
    "mix-mode",
    "invert-on-secondary",
];

/// Keyed table mapping 8-bit codes to parameter records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    entries: BTreeMap<ExoCode, ParameterRecord>,
}

impl ParameterTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the tab-separated text resource.
    ///
    /// Malformed rows are skipped with a warning; the first row for a code wins.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        for (idx, line) in text.lines().enumerate() {
            match Self::parse_row(idx + 1, line) {
                Ok(Some((code, record))) => {
                    table.entries.entry(code).or_insert(record);
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "skipping parameter table row"),
            }
        }
        table
    }

    /// Parses one row. Blank lines, comments, and the header yield `Ok(None)`.
    pub fn parse_row(line_no: usize, line: &str) -> Result<Option<(ExoCode, ParameterRecord)>, TableError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("bits") {
            return Ok(None);
        }
        let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
        let code: ExoCode = cols[0].parse().map_err(|e| with_line(e, line_no))?;
        let mut overrides = ParameterOverrides::default();
        for (name, cell) in PARAM_COLUMNS.iter().zip(cols.iter().skip(1)) {
            if cell.is_empty() || *cell == "-" {
                continue;
            }
            overrides.set(name, cell).map_err(|e| with_line(e, line_no))?;
        }
        Ok(Some((code, overrides.complete())))
    }

    /// Inserts a record, replacing any previous entry for `code`.
    pub fn insert(&mut self, code: ExoCode, record: ParameterRecord) {
        self.entries.insert(code, record);
    }

    /// Looks up the record for `code`.
    pub fn get(&self, code: ExoCode) -> Option<&ParameterRecord> {
        self.entries.get(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&ExoCode, &ParameterRecord)> {
        self.entries.iter()
    }
}

/// Bridge lookup mapping pattern ids to externally-derived 8-bit codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTable {
    codes: BTreeMap<String, ExoCode>,
}

impl BridgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the bridge TSV (`pattern_id  title  exotype_8bit  ...`).
    ///
    /// The header row and malformed rows are skipped.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("pattern_id") {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
            if cols.len() < 3 {
                warn!(err = %TableError::ShortRow { line: idx + 1, expected: 3 }, "skipping bridge row");
                continue;
            }
            match cols[2].parse::<ExoCode>() {
                Ok(code) => {
                    table.codes.entry(cols[0].to_string()).or_insert(code);
                }
                Err(err) => warn!(err = %with_line(err, idx + 1), "skipping bridge row"),
            }
        }
        table
    }

    pub fn insert(&mut self, pattern_id: impl Into<String>, code: ExoCode) {
        self.codes.insert(pattern_id.into(), code);
    }

    pub fn get(&self, pattern_id: &str) -> Option<ExoCode> {
        self.codes.get(pattern_id).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

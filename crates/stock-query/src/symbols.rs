//! Alias table mapping human names and codes to instruments

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::Path;
use std::sync::Arc;

/// A tradable instrument identified by its canonical market symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Canonical market symbol, e.g. `2330.TW`
    pub symbol: String,
    /// Display name, e.g. `台積電`
    pub name: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// Exchange code without the market suffix (`2330.TW` -> `2330`)
    pub fn code(&self) -> &str {
        self.symbol
            .split_once('.')
            .map_or(self.symbol.as_str(), |(code, _)| code)
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code())
    }
}

/// One row of an alias file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasEntry {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Built-in listings: (symbol, display name, extra aliases)
const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("2330.TW", "台積電", &["台积电", "tsmc", "台灣積體電路"]),
    ("2317.TW", "鴻海", &["鸿海", "foxconn", "honhai"]),
    ("2454.TW", "聯發科", &["联发科", "mediatek"]),
    ("2303.TW", "聯電", &["联电", "umc"]),
    ("2308.TW", "台達電", &["台达电", "delta"]),
    ("2412.TW", "中華電", &["中华电", "chunghwa", "cht"]),
    ("2881.TW", "富邦金", &["fubon"]),
    ("2882.TW", "國泰金", &["国泰金", "cathay"]),
    ("2603.TW", "長榮", &["长荣", "evergreen"]),
    ("3008.TW", "大立光", &["largan"]),
    ("3711.TW", "日月光投控", &["日月光", "ase"]),
    ("0050.TW", "元大台灣50", &["台灣50", "元大台湾50"]),
];

/// Normalize a user token for lookup.
///
/// Full-width ASCII folds to half-width, Latin letters fold to lower case,
/// CJK characters pass through untouched.
pub fn normalize_alias(token: &str) -> String {
    token
        .trim()
        .chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => {
                char::from_u32(u32::from(c) - 0xFEE0).unwrap_or(c)
            }
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_ascii_lowercase()
}

/// Read-only alias table, built once at start-up
#[derive(Debug, Clone, Default)]
pub struct SymbolResolver {
    aliases: HashMap<String, Arc<Instrument>>,
}

impl SymbolResolver {
    /// Empty resolver; see [`SymbolResolverBuilder`]
    pub fn builder() -> SymbolResolverBuilder {
        SymbolResolverBuilder::default()
    }

    /// Resolver holding the built-in listings
    pub fn with_builtin() -> Result<Self> {
        Self::builder().builtin()?.build()
    }

    /// Exact lookup after normalization; no partial or fuzzy matching
    pub fn resolve(&self, token: &str) -> Option<Arc<Instrument>> {
        self.aliases.get(&normalize_alias(token)).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.aliases.contains_key(&normalize_alias(token))
    }

    /// Number of aliases in the table
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Builder for [`SymbolResolver`]; rejects colliding aliases
#[derive(Debug, Default)]
pub struct SymbolResolverBuilder {
    aliases: HashMap<String, Arc<Instrument>>,
    instruments: HashMap<String, Arc<Instrument>>,
}

impl SymbolResolverBuilder {
    /// Add the built-in listings
    pub fn builtin(mut self) -> Result<Self> {
        for (symbol, name, aliases) in BUILTIN {
            self = self.instrument(symbol, name, aliases.iter().copied())?;
        }
        Ok(self)
    }

    /// Register an instrument with its aliases.
    ///
    /// The symbol, the bare code and the display name are aliases too.
    pub fn instrument<'a>(
        mut self,
        symbol: &str,
        name: &str,
        aliases: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let instrument = match self.instruments.get(symbol) {
            Some(existing) => Arc::clone(existing),
            None => {
                let created = Arc::new(Instrument::new(symbol, name));
                self.instruments
                    .insert(symbol.to_string(), Arc::clone(&created));
                created
            }
        };

        let code = instrument.code().to_string();
        for alias in [symbol, code.as_str(), name] {
            self.bind(alias, &instrument)?;
        }
        for alias in aliases {
            self.bind(alias, &instrument)?;
        }
        Ok(self)
    }

    /// Add entries parsed from a JSON alias file
    pub fn entries(mut self, entries: &[AliasEntry]) -> Result<Self> {
        for entry in entries {
            self = self.instrument(
                &entry.symbol,
                &entry.name,
                entry.aliases.iter().map(String::as_str),
            )?;
        }
        Ok(self)
    }

    /// Load a JSON alias file: `[{"symbol": "...", "name": "...", "aliases": [...]}]`
    pub fn alias_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let entries: Vec<AliasEntry> = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            count = entries.len(),
            "Loaded alias file"
        );
        self.entries(&entries)
    }

    fn bind(&mut self, alias: &str, instrument: &Arc<Instrument>) -> Result<()> {
        let key = normalize_alias(alias);
        if key.is_empty() {
            return Ok(());
        }
        // Input is split on whitespace, so such an alias could never match
        if key.chars().any(char::is_whitespace) {
            return Err(StockError::ConfigError(format!(
                "alias {alias:?} for {} contains whitespace",
                instrument.symbol
            )));
        }
        match self.aliases.get(&key) {
            Some(existing) if existing.symbol != instrument.symbol => {
                Err(StockError::AliasCollision {
                    alias: alias.to_string(),
                    existing: existing.symbol.clone(),
                    requested: instrument.symbol.clone(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.aliases.insert(key, Arc::clone(instrument));
                Ok(())
            }
        }
    }

    pub fn build(self) -> Result<SymbolResolver> {
        Ok(SymbolResolver {
            aliases: self.aliases,
        })
    }
}

//! package.json parsing and the shared parse cache.

use super::config::EntryField;
use super::result::{ModuleType, ResolveError};
use super::specifier::parse_bare;
use crate::probe::Probe;
use serde_json::Value;
use spindle_util::fs::FileSystem;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Replacement for a specifier from `alias` or the `browser` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasValue {
    /// Resolve this specifier instead.
    Specifier(String),
    /// `false`: resolve to an empty module.
    Disabled,
    /// `{ "global": "X" }`: resolve to a global variable.
    Global(String),
}

impl AliasValue {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Specifier(s.clone())),
            Value::Bool(false) => Some(Self::Disabled),
            Value::Object(obj) => obj
                .get("global")
                .and_then(Value::as_str)
                .map(|g| Self::Global(g.to_string())),
            _ => None,
        }
    }
}

/// The `browser` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BrowserField {
    #[default]
    None,
    /// String form: an alternative entry point.
    Entry(String),
    /// Object form: per-specifier and per-file replacements.
    Map(BTreeMap<String, AliasValue>),
}

/// The `sideEffects` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffects {
    All(bool),
    Patterns(Vec<glob::Pattern>),
}

/// The fields of a package.json that resolution cares about.
#[derive(Debug, Clone)]
pub struct PackageJson {
    pub path: PathBuf,
    pub name: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    pub source: Option<String>,
    pub types: Option<String>,
    pub browser: BrowserField,
    pub exports: Option<Value>,
    pub imports: Option<Value>,
    pub alias: BTreeMap<String, AliasValue>,
    pub side_effects: SideEffects,
    pub module_type: Option<ModuleType>,
}

impl PackageJson {
    /// Parse package.json text. Unknown or mistyped fields are ignored.
    ///
    /// # Errors
    /// Returns a message if the text is not a JSON object.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let Some(obj) = value.as_object() else {
            return Err("package.json must contain an object".to_string());
        };

        let string = |key: &str| obj.get(key).and_then(Value::as_str).map(ToString::to_string);

        let browser = match obj.get("browser") {
            Some(Value::String(s)) => BrowserField::Entry(s.clone()),
            Some(Value::Object(map)) => BrowserField::Map(
                map.iter()
                    .filter_map(|(k, v)| AliasValue::from_value(v).map(|a| (k.clone(), a)))
                    .collect(),
            ),
            _ => BrowserField::None,
        };

        let alias = obj
            .get("alias")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| AliasValue::from_value(v).map(|a| (k.clone(), a)))
                    .collect()
            })
            .unwrap_or_default();

        let side_effects = match obj.get("sideEffects") {
            Some(Value::Bool(b)) => SideEffects::All(*b),
            Some(Value::String(s)) => SideEffects::Patterns(compile_patterns([s.as_str()])),
            Some(Value::Array(items)) => {
                SideEffects::Patterns(compile_patterns(items.iter().filter_map(Value::as_str)))
            }
            _ => SideEffects::All(true),
        };

        let module_type = match obj.get("type").and_then(Value::as_str) {
            Some("module") => Some(ModuleType::Module),
            Some("commonjs") => Some(ModuleType::CommonJs),
            _ => None,
        };

        Ok(Self {
            path: path.into(),
            name: string("name"),
            main: string("main"),
            module: string("module"),
            source: string("source"),
            types: string("types").or_else(|| string("typings")),
            browser,
            exports: obj.get("exports").cloned(),
            imports: obj.get("imports").cloned(),
            alias,
            side_effects,
            module_type,
        })
    }

    /// Directory holding the package.json.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }

    /// The value of an entry field.
    #[must_use]
    pub fn entry(&self, field: EntryField) -> Option<&str> {
        match field {
            EntryField::Source => self.source.as_deref(),
            EntryField::Browser => match &self.browser {
                BrowserField::Entry(s) => Some(s),
                _ => None,
            },
            EntryField::Module => self.module.as_deref(),
            EntryField::Main => self.main.as_deref(),
            EntryField::Types => self.types.as_deref(),
        }
    }

    /// Replacement for `spec` from the `alias` field, and from the `browser`
    /// map when `browser` is set.
    ///
    /// An alias for a package name also applies to its subpaths:
    /// `{"alias": {"react": "preact/compat"}}` maps `react/hooks` to
    /// `preact/compat/hooks`.
    #[must_use]
    pub fn alias_for(&self, spec: &str, browser: bool) -> Option<AliasValue> {
        let browser_map = match &self.browser {
            BrowserField::Map(map) if browser => Some(map),
            _ => None,
        };

        for map in std::iter::once(&self.alias).chain(browser_map) {
            if let Some(value) = map.get(spec) {
                return Some(value.clone());
            }
        }

        let Ok((package, Some(subpath))) = parse_bare(spec) else {
            return None;
        };
        for map in std::iter::once(&self.alias).chain(browser_map) {
            match map.get(package) {
                Some(AliasValue::Specifier(target)) => {
                    return Some(AliasValue::Specifier(format!(
                        "{}/{subpath}",
                        target.trim_end_matches('/')
                    )));
                }
                Some(other) => return Some(other.clone()),
                None => {}
            }
        }

        None
    }

    /// Replacement for a file of this package from the `browser` map.
    ///
    /// Keys are package-relative (`./lib/node.js`) and may omit the extension.
    #[must_use]
    pub fn browser_file_redirect(&self, file: &Path) -> Option<&AliasValue> {
        let BrowserField::Map(map) = &self.browser else {
            return None;
        };
        let rel = file.strip_prefix(self.dir()).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        let with_ext = format!("./{rel}");
        let without_ext = match with_ext.rfind('.') {
            Some(dot) if dot > with_ext.rfind('/').unwrap_or(0) => &with_ext[..dot],
            _ => with_ext.as_str(),
        };

        map.get(&with_ext)
            .or_else(|| map.get(without_ext))
            .or_else(|| map.get(&rel))
    }

    /// Whether `file` of this package may have side effects.
    ///
    /// Patterns without a `/` match the file name anywhere in the package.
    #[must_use]
    pub fn has_side_effects(&self, file: &Path) -> bool {
        match &self.side_effects {
            SideEffects::All(b) => *b,
            SideEffects::Patterns(patterns) => {
                let Ok(rel) = file.strip_prefix(self.dir()) else {
                    return true;
                };
                let rel = rel.to_string_lossy().replace('\\', "/");
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                patterns.iter().any(|p| {
                    if p.as_str().contains('/') {
                        p.matches(&rel)
                    } else {
                        p.matches(&name)
                    }
                })
            }
        }
    }
}

fn compile_patterns<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<glob::Pattern> {
    raw.into_iter()
        .filter_map(|s| glob::Pattern::new(s.trim_start_matches("./")).ok())
        .collect()
}

/// Parsed package.json files shared by every resolution of one resolver.
///
/// A cache hit still records the file as a dependency of the resolution.
#[derive(Debug, Default)]
pub struct PackageJsonCache {
    entries: Mutex<HashMap<PathBuf, Arc<PackageJson>>>,
}

impl PackageJsonCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the package.json at `path`, or `None` if there is none.
    ///
    /// # Errors
    /// Unreadable or malformed files are errors, never treated as absent.
    pub fn load(&self, probe: &Probe<'_>, path: &Path) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        if let Some(cached) = self.entries.lock().unwrap().get(path).cloned() {
            probe.record_change(path);
            return Ok(Some(cached));
        }

        if !probe.is_file(path) {
            return Ok(None);
        }

        let text = match probe.read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ResolveError::io(path, &e)),
        };

        let parsed = PackageJson::parse(path, &text).map_err(|message| {
            ResolveError::InvalidPackageJson {
                path: path.to_path_buf(),
                message,
            }
        })?;

        let parsed = Arc::new(parsed);
        self.entries
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Arc::clone(&parsed));
        Ok(Some(parsed))
    }

    /// Forget a cached file after it changed.
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().unwrap().remove(path);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

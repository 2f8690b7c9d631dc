//! `spindle resolve` command implementation.

use super::{codes, fail, print_json, Project};
use miette::Result;
use serde::Serialize;
use spindle_core::{
    Config, ExportsConditions, ResolveRequest, ResolveResult, SpecifierKind, SCHEMA_VERSION,
};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ResolveAction {
    pub specifier: String,
    pub from: PathBuf,
    pub conditions: Vec<String>,
    pub kind: String,
}

#[derive(Serialize)]
struct ResolveJson<'a> {
    schema_version: u32,
    ok: bool,
    specifier: &'a str,
    from: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    result: &'a ResolveResult,
}

fn parse_kind(kind: &str) -> Option<SpecifierKind> {
    match kind {
        "esm" => Some(SpecifierKind::Esm),
        "commonjs" | "cjs" => Some(SpecifierKind::CommonJs),
        "url" => Some(SpecifierKind::Url),
        "custom" => Some(SpecifierKind::Custom),
        _ => None,
    }
}

pub fn run(config: &Config, action: ResolveAction, json: bool) -> Result<()> {
    let project = Project::open_or_exit(config, json);
    let from = project.existing(&action.from).unwrap_or_else(|e| e.exit(json));

    let Some(kind) = parse_kind(&action.kind) else {
        fail(json, codes::CLI_INVALID_ARGUMENT, format!("unknown specifier kind '{}'", action.kind));
    };
    let mut request = ResolveRequest::new(action.specifier.clone(), from.clone()).with_kind(kind);
    if !action.conditions.is_empty() {
        match ExportsConditions::parse_list(&action.conditions) {
            Ok(conditions) => request = request.with_conditions(conditions),
            Err(name) => fail(json, codes::CLI_INVALID_ARGUMENT, format!("unknown export condition '{name}'")),
        }
    }

    let result = project.resolver.resolve(&request);
    debug!(
        specifier = %action.specifier,
        resolution = result.resolution.kind(),
        ok = result.is_ok(),
        "resolved"
    );

    if json {
        print_json(&ResolveJson {
            schema_version: SCHEMA_VERSION,
            ok: result.is_ok(),
            specifier: &action.specifier,
            from,
            code: result.error.as_ref().map(spindle_core::ResolveError::code),
            result: &result,
        })?;
    } else {
        print_human(&action.specifier, &result);
    }

    if !result.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_human(specifier: &str, result: &ResolveResult) {
    if let Some(error) = &result.error {
        eprintln!("error[{}]: {error}", error.code());
    } else {
        match result.resolution.path() {
            Some(path) => println!("{specifier} -> {}", path.display()),
            None => println!("{specifier} -> ({:?})", result.resolution),
        }
    }

    let inv = result.invalidations();
    if !inv.is_empty() {
        println!(
            "  invalidated by {} file change(s), {} file creation(s)",
            inv.invalidate_on_file_change.len(),
            inv.invalidate_on_file_create.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("esm"), Some(SpecifierKind::Esm));
        assert_eq!(parse_kind("cjs"), Some(SpecifierKind::CommonJs));
        assert_eq!(parse_kind("commonjs"), Some(SpecifierKind::CommonJs));
        assert_eq!(parse_kind("amd"), None);
    }
}

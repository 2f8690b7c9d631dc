//! Package.json `exports` and `imports` field evaluation.
//!
//! Implements Node.js-compatible resolution:
//! - String, subpath and conditions-object shapes
//! - Pattern keys with a single `*`; the most specific pattern wins
//! - Nested conditions, evaluated in the package's key order
//! - Target arrays (first valid target wins)
//! - `null` targets exclude a subpath

use super::config::ExportsConditions;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Outcome of matching a subpath against `exports` or `imports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportsMatch {
    /// A target relative to the package root (`./...`), or a bare specifier
    /// for `imports` targets.
    Target(String),
    /// No key matches the subpath, or the key maps to `null`.
    NotExported,
    /// A key matches but none of its conditions is active.
    NoMatchingCondition,
    /// The target is not a valid package target.
    InvalidTarget(String),
}

/// Resolve `subpath` (`.` or `./x`) through an `exports` value.
#[must_use]
pub fn resolve_exports(
    exports: &Value,
    subpath: &str,
    conditions: ExportsConditions,
) -> ExportsMatch {
    if is_conditional_sugar(exports) {
        if subpath != "." {
            return ExportsMatch::NotExported;
        }
        return resolve_target(exports, None, conditions, false);
    }

    match exports.as_object() {
        Some(map) => resolve_map(map, subpath, conditions, false),
        None => ExportsMatch::NotExported,
    }
}

/// Resolve a `#` specifier through an `imports` value.
#[must_use]
pub fn resolve_imports(
    imports: &Value,
    specifier: &str,
    conditions: ExportsConditions,
) -> ExportsMatch {
    if !specifier.starts_with('#') {
        return ExportsMatch::NotExported;
    }
    match imports.as_object() {
        Some(map) => resolve_map(map, specifier, conditions, true),
        None => ExportsMatch::NotExported,
    }
}

/// `exports` that is a string, an array, or an object without `.` keys
/// is shorthand for `{ ".": exports }`.
fn is_conditional_sugar(exports: &Value) -> bool {
    match exports {
        Value::String(_) | Value::Array(_) => true,
        Value::Object(map) => !map.keys().any(|k| k.starts_with('.')),
        _ => false,
    }
}

fn resolve_map(
    map: &Map<String, Value>,
    key: &str,
    conditions: ExportsConditions,
    is_imports: bool,
) -> ExportsMatch {
    if !key.contains('*') {
        if let Some(target) = map.get(key) {
            return resolve_target(target, None, conditions, is_imports);
        }
    }

    let mut best: Option<(&str, &str)> = None;
    for candidate in map.keys() {
        let Some(star) = candidate.find('*') else {
            continue;
        };
        if candidate[star + 1..].contains('*') {
            continue;
        }

        let (prefix, suffix) = (&candidate[..star], &candidate[star + 1..]);
        if key.len() <= prefix.len() + suffix.len()
            || !key.starts_with(prefix)
            || !key.ends_with(suffix)
        {
            continue;
        }

        let captured = &key[prefix.len()..key.len() - suffix.len()];
        let better = match best {
            None => true,
            Some((current, _)) => pattern_key_compare(candidate, current) == Ordering::Less,
        };
        if better {
            best = Some((candidate.as_str(), captured));
        }
    }

    match best {
        Some((pattern, captured)) => resolve_target(&map[pattern], Some(captured), conditions, is_imports),
        None => ExportsMatch::NotExported,
    }
}

/// Node's PATTERN_KEY_COMPARE: longer prefix before the `*` first, then the
/// longer key.
fn pattern_key_compare(a: &str, b: &str) -> Ordering {
    let base_a = a.find('*').map_or(a.len(), |i| i + 1);
    let base_b = b.find('*').map_or(b.len(), |i| i + 1);
    base_b.cmp(&base_a).then_with(|| b.len().cmp(&a.len()))
}

fn resolve_target(
    target: &Value,
    captured: Option<&str>,
    conditions: ExportsConditions,
    is_imports: bool,
) -> ExportsMatch {
    match target {
        Value::String(s) => resolve_string_target(s, captured, is_imports),
        Value::Array(items) => {
            let mut last = ExportsMatch::NotExported;
            for item in items {
                match resolve_target(item, captured, conditions, is_imports) {
                    found @ ExportsMatch::Target(_) => return found,
                    other => last = other,
                }
            }
            last
        }
        Value::Object(map) => {
            for (key, value) in map {
                if !conditions.matches_key(key) {
                    continue;
                }
                match resolve_target(value, captured, conditions, is_imports) {
                    ExportsMatch::NoMatchingCondition => {}
                    other => return other,
                }
            }
            ExportsMatch::NoMatchingCondition
        }
        Value::Null => ExportsMatch::NotExported,
        _ => ExportsMatch::InvalidTarget(target.to_string()),
    }
}

fn resolve_string_target(target: &str, captured: Option<&str>, is_imports: bool) -> ExportsMatch {
    let substitute = |s: &str| match captured {
        Some(c) => s.replace('*', c),
        None => s.to_string(),
    };

    if !target.starts_with("./") {
        // `imports` may map to another package
        let bare = is_imports
            && !target.starts_with("../")
            && !target.starts_with('/')
            && !target.contains(':');
        if bare {
            return ExportsMatch::Target(substitute(target));
        }
        return ExportsMatch::InvalidTarget(target.to_string());
    }

    let invalid_segment =
        |seg: &str| seg == ".." || seg == "." || seg.eq_ignore_ascii_case("node_modules");
    if target[2..].split('/').any(invalid_segment) {
        return ExportsMatch::InvalidTarget(target.to_string());
    }

    if let Some(c) = captured {
        if c.split('/').any(invalid_segment) {
            return ExportsMatch::InvalidTarget(substitute(target));
        }
    }

    ExportsMatch::Target(substitute(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IMPORT: ExportsConditions = ExportsConditions::IMPORT;
    const REQUIRE: ExportsConditions = ExportsConditions::REQUIRE;

    fn target(s: &str) -> ExportsMatch {
        ExportsMatch::Target(s.to_string())
    }

    #[test]
    fn test_string_exports() {
        let exports = json!("./index.js");
        assert_eq!(resolve_exports(&exports, ".", IMPORT), target("./index.js"));
        assert_eq!(resolve_exports(&exports, "./x", IMPORT), ExportsMatch::NotExported);
    }

    #[test]
    fn test_root_conditions_sugar() {
        let exports = json!({"import": "./esm.js", "require": "./cjs.js"});
        assert_eq!(resolve_exports(&exports, ".", IMPORT), target("./esm.js"));
        assert_eq!(resolve_exports(&exports, ".", REQUIRE), target("./cjs.js"));
        assert_eq!(
            resolve_exports(&exports, ".", ExportsConditions::empty()),
            ExportsMatch::NoMatchingCondition
        );
    }

    #[test]
    fn test_condition_order_follows_package() {
        // "default" first shadows everything after it
        let exports = json!({".": {"default": "./d.js", "import": "./esm.js"}});
        assert_eq!(resolve_exports(&exports, ".", IMPORT), target("./d.js"));

        let exports = json!({".": {"browser": "./b.js", "import": "./esm.js"}});
        assert_eq!(
            resolve_exports(&exports, ".", IMPORT | ExportsConditions::BROWSER),
            target("./b.js")
        );
        assert_eq!(resolve_exports(&exports, ".", IMPORT), target("./esm.js"));
    }

    #[test]
    fn test_nested_conditions() {
        let exports = json!({
            ".": {
                "node": {"import": "./node.mjs", "require": "./node.cjs"},
                "default": "./browser.js"
            }
        });
        let node = ExportsConditions::NODE;
        assert_eq!(resolve_exports(&exports, ".", node | REQUIRE), target("./node.cjs"));
        assert_eq!(resolve_exports(&exports, ".", IMPORT), target("./browser.js"));
    }

    #[test]
    fn test_nested_miss_falls_through_to_next_condition() {
        let exports = json!({".": {"node": {"import": "./node.mjs"}, "default": "./d.js"}});
        assert_eq!(
            resolve_exports(&exports, ".", ExportsConditions::NODE | REQUIRE),
            target("./d.js")
        );
    }

    #[test]
    fn test_subpaths_and_patterns() {
        let exports = json!({
            ".": "./index.js",
            "./feature": "./dist/feature.js",
            "./utils/*": "./dist/utils/*.js",
            "./utils/internal/*": null,
            "./*": "./dist/*.js"
        });
        assert_eq!(resolve_exports(&exports, "./feature", IMPORT), target("./dist/feature.js"));
        assert_eq!(
            resolve_exports(&exports, "./utils/a/b", IMPORT),
            target("./dist/utils/a/b.js")
        );
        assert_eq!(resolve_exports(&exports, "./other", IMPORT), target("./dist/other.js"));
        assert_eq!(
            resolve_exports(&exports, "./utils/internal/x", IMPORT),
            ExportsMatch::NotExported
        );
    }

    #[test]
    fn test_pattern_with_suffix() {
        let exports = json!({"./icons/*.svg": "./assets/*.svg"});
        assert_eq!(
            resolve_exports(&exports, "./icons/home.svg", IMPORT),
            target("./assets/home.svg")
        );
        assert_eq!(resolve_exports(&exports, "./icons/home.png", IMPORT), ExportsMatch::NotExported);
    }

    #[test]
    fn test_pattern_requires_nonempty_capture() {
        let exports = json!({"./utils/*": "./src/utils/*.js", "./icons/*.svg": "./assets/*.svg"});
        assert_eq!(resolve_exports(&exports, "./utils/", IMPORT), ExportsMatch::NotExported);
        assert_eq!(resolve_exports(&exports, "./icons/.svg", IMPORT), ExportsMatch::NotExported);
        assert_eq!(
            resolve_exports(&exports, "./utils/a", IMPORT),
            target("./src/utils/a.js")
        );
    }

    #[test]
    fn test_unexported_subpath() {
        let exports = json!({".": "./index.js"});
        assert_eq!(resolve_exports(&exports, "./secret", IMPORT), ExportsMatch::NotExported);
    }

    #[test]
    fn test_invalid_targets() {
        let exports = json!({".": "index.js", "./x": "./../escape.js", "./p/*": "./dist/*.js"});
        assert!(matches!(resolve_exports(&exports, ".", IMPORT), ExportsMatch::InvalidTarget(_)));
        assert!(matches!(resolve_exports(&exports, "./x", IMPORT), ExportsMatch::InvalidTarget(_)));
        assert!(matches!(
            resolve_exports(&exports, "./p/../../etc", IMPORT),
            ExportsMatch::InvalidTarget(_)
        ));
    }

    #[test]
    fn test_array_targets() {
        let exports = json!({".": [{"worker": "./w.js"}, "./fallback.js"]});
        assert_eq!(resolve_exports(&exports, ".", IMPORT), target("./fallback.js"));
    }

    #[test]
    fn test_imports() {
        let imports = json!({
            "#utils": "./src/utils.js",
            "#dep": {"node": "dep-node", "default": "./polyfill.js"},
            "#internal/*": "./src/internal/*.js"
        });
        assert_eq!(resolve_imports(&imports, "#utils", IMPORT), target("./src/utils.js"));
        assert_eq!(
            resolve_imports(&imports, "#dep", ExportsConditions::NODE),
            target("dep-node")
        );
        assert_eq!(resolve_imports(&imports, "#dep", IMPORT), target("./polyfill.js"));
        assert_eq!(
            resolve_imports(&imports, "#internal/a", IMPORT),
            target("./src/internal/a.js")
        );
        assert_eq!(resolve_imports(&imports, "#missing", IMPORT), ExportsMatch::NotExported);
    }

    #[test]
    fn test_pattern_key_compare() {
        assert_eq!(pattern_key_compare("./a/b/*", "./a/*"), Ordering::Less);
        assert_eq!(pattern_key_compare("./a/*.js", "./a/*"), Ordering::Less);
        assert_eq!(pattern_key_compare("./*", "./x/*"), Ordering::Greater);
    }
}

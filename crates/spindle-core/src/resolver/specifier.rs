//! Specifier classification.

use super::config::ResolverMode;
use std::path::PathBuf;

/// The shape of a specifier, which selects the resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// `./x`, `../x`, `.` or `..`.
    Relative(String),
    /// `/x`; a filesystem path in Node mode, project-root relative in
    /// bundler mode.
    Absolute(PathBuf),
    /// A `file://` URL; always a filesystem path.
    FileUrl(PathBuf),
    /// `~/x`: relative to the nearest package root.
    Tilde(String),
    /// `#x`: looked up in the `imports` field.
    Hash(String),
    /// A package name with an optional subpath (without a leading `./`).
    Bare {
        package: String,
        subpath: Option<String>,
    },
    /// `node:x`.
    Builtin(String),
    /// A URL that is never bundled.
    Url(String),
}

/// Schemes that resolve to `External`.
const EXTERNAL_SCHEMES: &[&str] = &["http", "https", "data"];

/// Classify `spec`.
///
/// # Errors
/// Returns a human-readable reason when `spec` is malformed.
pub fn parse(spec: &str, mode: ResolverMode) -> Result<Specifier, String> {
    if spec.is_empty() {
        return Err("specifier is empty".to_string());
    }

    if spec.contains('\0') {
        return Err("specifier contains a NUL byte".to_string());
    }

    if let Some(name) = spec.strip_prefix("node:") {
        if name.is_empty() {
            return Err("missing builtin name after 'node:'".to_string());
        }
        return Ok(Specifier::Builtin(name.to_string()));
    }

    if let Some(rest) = spec.strip_prefix("npm:") {
        return match parse(rest, mode)? {
            bare @ Specifier::Bare { .. } => Ok(bare),
            _ => Err("'npm:' must be followed by a package name".to_string()),
        };
    }

    if let Some(path) = spec.strip_prefix("file://") {
        if !path.starts_with('/') {
            return Err("file URL must carry an absolute path".to_string());
        }
        return Ok(Specifier::FileUrl(PathBuf::from(path)));
    }

    if spec.starts_with("//") {
        return Ok(Specifier::Url(spec.to_string()));
    }

    if let Some(scheme) = url_scheme(spec) {
        if EXTERNAL_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
            return Ok(Specifier::Url(spec.to_string()));
        }
        return Err(format!("unsupported scheme '{scheme}:'"));
    }

    if spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../") {
        return Ok(Specifier::Relative(spec.to_string()));
    }

    if is_absolute_path(spec) {
        return Ok(Specifier::Absolute(PathBuf::from(spec)));
    }

    if spec == "~" || spec.starts_with("~/") {
        if mode == ResolverMode::Node {
            return Err("'~' specifiers are only supported in bundler mode".to_string());
        }
        let rest = spec.trim_start_matches('~').trim_start_matches('/');
        return Ok(Specifier::Tilde(rest.to_string()));
    }

    if spec.starts_with('#') {
        if spec == "#" || spec.starts_with("#/") {
            return Err("invalid imports specifier".to_string());
        }
        return Ok(Specifier::Hash(spec.to_string()));
    }

    let (package, subpath) = parse_bare(spec)?;
    Ok(Specifier::Bare {
        package: package.to_string(),
        subpath: subpath.map(ToString::to_string),
    })
}

/// Split a bare specifier into package name and subpath.
///
/// `lodash/fp` gives `("lodash", Some("fp"))`, `@scope/pkg/sub` gives
/// `("@scope/pkg", Some("sub"))`.
///
/// # Errors
/// Returns a reason for malformed package names.
pub fn parse_bare(spec: &str) -> Result<(&str, Option<&str>), String> {
    let name_end = if spec.starts_with('@') {
        let Some(slash) = spec.find('/') else {
            return Err("scoped package name must be '@scope/name'".to_string());
        };
        if slash == 1 {
            return Err("package scope is empty".to_string());
        }
        let after_scope = &spec[slash + 1..];
        if after_scope.is_empty() || after_scope.starts_with('/') {
            return Err("scoped package name is empty".to_string());
        }
        after_scope
            .find('/')
            .map_or(spec.len(), |i| slash + 1 + i)
    } else {
        spec.find('/').unwrap_or(spec.len())
    };

    let package = &spec[..name_end];
    if package.starts_with('.') || package.contains('\\') {
        return Err(format!("invalid package name '{package}'"));
    }

    let subpath = spec
        .get(name_end + 1..)
        .filter(|s| !s.is_empty());

    Ok((package, subpath))
}

/// The scheme of `spec` if it looks like a URL.
///
/// Single letters are not schemes so that `C:\x` stays a path.
fn url_scheme(spec: &str) -> Option<&str> {
    let colon = spec.find(':')?;
    let scheme = &spec[..colon];
    if scheme.len() < 2 {
        return None;
    }
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme)
    } else {
        None
    }
}

/// `.`, `..` and paths ending in `/` name a directory and never a file.
pub fn is_directory_only(spec: &str) -> bool {
    spec == "."
        || spec == ".."
        || spec.ends_with('/')
        || spec.ends_with("/.")
        || spec.ends_with("/..")
}

/// Check if a specifier is an absolute path.
fn is_absolute_path(spec: &str) -> bool {
    if spec.starts_with('/') {
        return true;
    }

    // Windows absolute: C:\, D:/
    let bytes = spec.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        return true;
    }

    // UNC path: \\server\share
    spec.starts_with("\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(spec: &str) -> Result<Specifier, String> {
        parse(spec, ResolverMode::Node)
    }

    #[test]
    fn test_relative_and_absolute() {
        assert_eq!(node("./a"), Ok(Specifier::Relative("./a".into())));
        assert_eq!(node(".."), Ok(Specifier::Relative("..".into())));
        assert_eq!(node("/p/a.js"), Ok(Specifier::Absolute("/p/a.js".into())));
        assert_eq!(node("C:\\x\\a.js"), Ok(Specifier::Absolute("C:\\x\\a.js".into())));
        assert_eq!(
            node("file:///p/a.js"),
            Ok(Specifier::FileUrl("/p/a.js".into()))
        );
    }

    #[test]
    fn test_directory_only() {
        assert!(is_directory_only("."));
        assert!(is_directory_only(".."));
        assert!(is_directory_only("./lib/"));
        assert!(is_directory_only("../.."));
        assert!(is_directory_only("/p/src/"));
        assert!(!is_directory_only("./lib"));
        assert!(!is_directory_only("./.config"));
    }

    #[test]
    fn test_bare() {
        assert_eq!(
            node("lodash/fp/map"),
            Ok(Specifier::Bare {
                package: "lodash".into(),
                subpath: Some("fp/map".into())
            })
        );
        assert_eq!(
            node("@scope/pkg"),
            Ok(Specifier::Bare {
                package: "@scope/pkg".into(),
                subpath: None
            })
        );
        assert_eq!(
            node("npm:@scope/pkg/x"),
            Ok(Specifier::Bare {
                package: "@scope/pkg".into(),
                subpath: Some("x".into())
            })
        );
    }

    #[test]
    fn test_builtin_and_urls() {
        assert_eq!(node("node:fs"), Ok(Specifier::Builtin("fs".into())));
        assert_eq!(
            node("https://cdn.example.com/x.js"),
            Ok(Specifier::Url("https://cdn.example.com/x.js".into()))
        );
        assert_eq!(
            node("//cdn.example.com/x.js"),
            Ok(Specifier::Url("//cdn.example.com/x.js".into()))
        );
        assert!(matches!(node("data:text/javascript,1"), Ok(Specifier::Url(_))));
    }

    #[test]
    fn test_tilde_depends_on_mode() {
        assert!(node("~/src/a").is_err());
        assert_eq!(
            parse("~/src/a", ResolverMode::Bundler),
            Ok(Specifier::Tilde("src/a".into()))
        );
    }

    #[test]
    fn test_hash() {
        assert_eq!(node("#utils"), Ok(Specifier::Hash("#utils".into())));
        assert!(node("#").is_err());
        assert!(node("#/x").is_err());
    }

    #[test]
    fn test_malformed() {
        assert!(node("").is_err());
        assert!(node("a\0b").is_err());
        assert!(node("node:").is_err());
        assert!(node("@scope").is_err());
        assert!(node("@/x").is_err());
        assert!(node("virtual:thing").is_err());
        assert!(node("npm:./x").is_err());
    }
}

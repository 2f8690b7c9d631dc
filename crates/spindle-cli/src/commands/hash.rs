//! `spindle hash` command implementation.

use super::{codes, fail, print_json};
use miette::Result;
use serde::Serialize;
use spindle_core::SCHEMA_VERSION;
use spindle_util::hash::{hash_file, hash_string, short_id};
use spindle_util::OsFileSystem;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct HashJson<'a> {
    schema_version: u32,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a Path>,
    hash: &'a str,
    short: &'a str,
}

pub fn run(cwd: &Path, file: Option<PathBuf>, input: Option<String>, json: bool) -> Result<()> {
    let (hash, file) = match (file, input) {
        (Some(file), _) => {
            let path = cwd.join(file);
            match hash_file(&OsFileSystem, &path) {
                Ok(hash) => (hash, Some(path)),
                Err(e) => fail(json, codes::CLI_IO_ERROR, format!("{}: {e}", path.display())),
            }
        }
        (None, Some(input)) => (hash_string(&input), None),
        (None, None) => fail(json, codes::CLI_INVALID_ARGUMENT, "give a string or --file to hash"),
    };

    if json {
        print_json(&HashJson {
            schema_version: SCHEMA_VERSION,
            ok: true,
            file: file.as_deref(),
            hash: &hash,
            short: short_id(&hash),
        })?;
    } else {
        println!("{hash}");
    }
    Ok(())
}

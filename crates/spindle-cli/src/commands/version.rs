//! `spindle version` command implementation.

use super::print_json;
use miette::Result;
use serde::Serialize;
use spindle_core::VersionInfo;

#[derive(Serialize)]
struct VersionJson {
    ok: bool,
    #[serde(flatten)]
    info: VersionInfo,
}

pub fn run(json: bool) -> Result<()> {
    let info = VersionInfo::current();
    if json {
        print_json(&VersionJson { ok: true, info })
    } else {
        println!("{info}");
        Ok(())
    }
}

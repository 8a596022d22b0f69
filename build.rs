//! Build script for generating the `stackreach` man page.
//!
//! The man page is rendered from the same clap definitions the binary uses
//! and written to the build output directory.

use std::env;
use std::io::{self, Write};

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var("OUT_DIR")
        .map(Utf8PathBuf::from)
        .map_err(|err| io::Error::new(io::ErrorKind::NotFound, format!("OUT_DIR: {err}")))?;
    let out = Dir::open_ambient_dir(&out_dir, ambient_authority())?;

    let mut page = Vec::new();
    Man::new(Cli::command()).render(&mut page)?;
    out.write("stackreach.1", page)?;

    Ok(())
}

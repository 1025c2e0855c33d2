//! JSON output for CLI
//!
//! One pretty-printed JSON document per command on stdout; logs go to
//! stderr.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `value` as JSON to stdout
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    write_json_to(&mut stdout, value)
}

pub(crate) fn write_json_to<W: Write, T: Serialize>(writer: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

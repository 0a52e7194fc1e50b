//! Step commands as a C array initializer, for compiling straight into
//! controller firmware.

use std::io::{Read, Write};

use crate::{Result, StepCommand};

/// Pulls step commands out of anything that looks like step CSV.
///
/// This is much more forgiving than [`crate::csv::read_steps`]: there is no
/// header check, and any line that doesn't start with three integers
/// (headers, comments, blank lines) is silently passed over. Extra columns
/// are ignored.
pub fn scan_rows(r: impl Read) -> Result<Vec<StepCommand>> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(r);
    let mut out = Vec::new();
    for record in rdr.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => continue,
        };
        if let Some(cmd) = parse_record(&record) {
            out.push(cmd);
        }
    }
    Ok(out)
}

fn parse_record(record: &::csv::StringRecord) -> Option<StepCommand> {
    Some(StepCommand::new(
        record.get(0)?.parse().ok()?,
        record.get(1)?.parse().ok()?,
        record.get(2)?.parse().ok()?,
    ))
}

pub fn write_c_array(mut w: impl Write, cmds: &[StepCommand]) -> Result<()> {
    writeln!(w, "steps[][3] = {{")?;
    for c in cmds {
        writeln!(w, "    {{{}, {}, {}}},", c.curve_id, c.steps.left, c.steps.right)?;
    }
    writeln!(w, "}};")?;
    Ok(())
}

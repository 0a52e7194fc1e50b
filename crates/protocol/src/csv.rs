//! The step CSV handed to the motor controller: `curve_id,abs_step_L,abs_step_R`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use fivebar_curves::{csv::header_line, CurveId, Loaded};
use serde::{Deserialize, Serialize};

use crate::{Result, StepCommand, StepError};

pub const HEADER: &str = "curve_id,abs_step_L,abs_step_R";

#[derive(Debug, Serialize, Deserialize)]
struct StepRow {
    curve_id: CurveId,
    #[serde(rename = "abs_step_L")]
    left: i32,
    #[serde(rename = "abs_step_R")]
    right: i32,
}

pub fn write_steps(w: impl Write, cmds: &[StepCommand]) -> Result<()> {
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(w);
    wtr.write_record(HEADER.split(','))?;
    for c in cmds {
        wtr.serialize(StepRow {
            curve_id: c.curve_id,
            left: c.steps.left,
            right: c.steps.right,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_steps(path: &Path, cmds: &[StepCommand]) -> Result<()> {
    write_steps(File::create(path)?, cmds)?;
    log::info!("wrote {} step commands to {}", cmds.len(), path.display());
    Ok(())
}

pub fn read_steps(r: impl Read) -> Result<Loaded<Vec<StepCommand>>> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_reader(r);
    let found = header_line(&mut rdr)?;
    if found != HEADER {
        return Err(StepError::Header {
            expected: HEADER.to_owned(),
            found,
        });
    }

    let mut value = Vec::new();
    let mut rejected_rows = 0;
    for row in rdr.deserialize::<StepRow>() {
        match row {
            Ok(row) => value.push(StepCommand::new(row.curve_id, row.left, row.right)),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => rejected_rows += 1,
        }
    }
    if rejected_rows > 0 {
        log::warn!("skipped {rejected_rows} malformed step rows");
    }
    Ok(Loaded {
        value,
        rejected_rows,
    })
}

pub fn load_steps(path: &Path) -> Result<Loaded<Vec<StepCommand>>> {
    read_steps(File::open(path)?)
}

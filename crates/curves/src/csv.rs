//! The curve CSV format, with columns `curve_id,index,x,y`.
//!
//! This is both how the extraction stage hands curves over and how we dump
//! laid-out curves for inspection.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::{Curve, CurveError, CurveId, Loaded, RawCurve, Result};

pub const HEADER: &str = "curve_id,index,x,y";

#[derive(Debug, Serialize, Deserialize)]
struct CurveRow {
    curve_id: CurveId,
    index: u64,
    x: f64,
    y: f64,
}

/// The header row of a CSV file, joined back up with commas.
///
/// With a trimming reader, `"curve_id", index` comes back as
/// `curve_id,index`.
pub fn header_line<R: Read>(rdr: &mut ::csv::Reader<R>) -> ::csv::Result<String> {
    Ok(rdr.headers()?.iter().collect::<Vec<_>>().join(","))
}

pub fn write_curves(w: impl Write, curves: &[RawCurve]) -> Result<()> {
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(w);
    wtr.write_record(HEADER.split(','))?;
    for c in curves {
        for (i, p) in c.points.iter().enumerate() {
            wtr.serialize(CurveRow {
                curve_id: c.id,
                index: i as u64,
                x: p.x,
                y: p.y,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_curves(path: &Path, curves: &[RawCurve]) -> Result<()> {
    write_curves(File::create(path)?, curves)
}

/// Reads curves, grouping consecutive rows with the same id.
///
/// Within a curve, points are sorted by their index column. Rows with the
/// wrong number of fields or unparseable numbers are skipped and counted.
pub fn read_curves(r: impl Read) -> Result<Loaded<Vec<RawCurve>>> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_reader(r);
    let found = header_line(&mut rdr)?;
    if found != HEADER {
        return Err(CurveError::Header {
            expected: HEADER.to_owned(),
            found,
        });
    }

    let mut rejected_rows = 0;
    let mut curves: Vec<Curve<(u64, Point)>> = Vec::new();
    for row in rdr.deserialize::<CurveRow>() {
        let row = match row {
            Ok(row) if row.x.is_finite() && row.y.is_finite() => row,
            Ok(row) => {
                log::warn!("skipping non-finite curve row {row:?}");
                rejected_rows += 1;
                continue;
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                log::warn!("skipping malformed curve row: {e}");
                rejected_rows += 1;
                continue;
            }
        };
        let p = (row.index, Point::new(row.x, row.y));
        match curves.last_mut() {
            Some(c) if c.id == row.curve_id => c.points.push(p),
            _ => curves.push(Curve::new(row.curve_id, vec![p])),
        }
    }

    let value = curves
        .into_iter()
        .map(|mut c| {
            c.points.sort_by_key(|(i, _)| *i);
            Curve::new(c.id, c.points.into_iter().map(|(_, p)| p).collect())
        })
        .collect();
    Ok(Loaded {
        value,
        rejected_rows,
    })
}

pub fn load_curves(path: &Path) -> Result<Loaded<Vec<RawCurve>>> {
    read_curves(File::open(path)?)
}

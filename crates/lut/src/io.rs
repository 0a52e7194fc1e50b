//! Reading and writing tables and resolved curves.
//!
//! Tables go to disk in two forms: a CSV with one row per safe pose
//! (`theta_L,theta_R,x,y`), and a binary index that also holds the k-d tree.
//! The CSV may start with a comment line recording the mechanism it was
//! built for, like `# l1=65 l2=85 d=50 offset=25`.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::path::Path;

use fivebar_curves::csv::header_line;
use fivebar_curves::{Curve, CurveId, Loaded, ResolvedCurve, ResolvedPoint};
use fivebar_geom::{Config, LinkagePose, Point};
use serde::{Deserialize, Serialize};

use crate::table::{CalibrationTable, IndexedTable, TableEntry};
use crate::{LutError, Result};

pub const TABLE_HEADER: &str = "theta_L,theta_R,x,y";
pub const RESOLVED_HEADER: &str = "curve_id,index,x,y,theta_L,theta_R";

#[derive(Debug, Serialize, Deserialize)]
struct TableRow {
    #[serde(rename = "theta_L")]
    theta_l: f64,
    #[serde(rename = "theta_R")]
    theta_r: f64,
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResolvedRow {
    curve_id: CurveId,
    index: usize,
    x: f64,
    y: f64,
    #[serde(rename = "theta_L")]
    theta_l: Option<f64>,
    #[serde(rename = "theta_R")]
    theta_r: Option<f64>,
}

/// The mechanism parameters that a table depends on, in the form used by
/// the CSV comment line.
pub fn mechanism_stamp(config: &Config) -> String {
    format!(
        "l1={} l2={} d={} offset={}",
        config.first_link.get(),
        config.second_link.get(),
        config.motor_distance.get(),
        config.pen_offset.get()
    )
}

fn link_lengths(config: &Config) -> [f64; 4] {
    [
        config.first_link.get(),
        config.second_link.get(),
        config.motor_distance.get(),
        config.pen_offset.get(),
    ]
}

fn same_lengths(a: [f64; 4], b: [f64; 4]) -> bool {
    a.iter().zip(b).all(|(a, b)| (a - b).abs() < 1e-9)
}

/// Whether a table built for `built` is valid for `current`.
///
/// Only the link lengths and pen offset matter. The step angle never
/// touches a table entry, so it is free to differ.
pub fn mechanism_matches(built: &Config, current: &Config) -> bool {
    same_lengths(link_lengths(built), link_lengths(current))
}

fn parse_stamp(line: &str) -> Option<[f64; 4]> {
    let mut out = [0.0; 4];
    let mut seen = [false; 4];
    for field in line.split_whitespace() {
        let (key, value) = field.split_once('=')?;
        let slot = match key {
            "l1" => 0,
            "l2" => 1,
            "d" => 2,
            "offset" => 3,
            _ => return None,
        };
        out[slot] = value.parse().ok()?;
        seen[slot] = true;
    }
    seen.iter().all(|s| *s).then_some(out)
}

fn check_stamp(line: &str, expected: &Config) -> Result<()> {
    let mismatch = || LutError::MechanismMismatch {
        expected: mechanism_stamp(expected),
        found: line.to_owned(),
    };
    let found = parse_stamp(line).ok_or_else(mismatch)?;
    if same_lengths(found, link_lengths(expected)) {
        Ok(())
    } else {
        Err(mismatch())
    }
}

fn check_header<R: Read>(rdr: &mut csv::Reader<R>, expected: &str) -> Result<()> {
    let found = header_line(rdr)?;
    if found != expected {
        return Err(LutError::Header {
            expected: expected.to_owned(),
            found,
        });
    }
    Ok(())
}

pub fn write_table(mut w: impl Write, table: &CalibrationTable) -> Result<()> {
    writeln!(w, "# {}", mechanism_stamp(&table.config))?;
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(TABLE_HEADER.split(','))?;
    for e in &table.entries {
        wtr.serialize(TableRow {
            theta_l: e.pose.left.to_degrees(),
            theta_r: e.pose.right.to_degrees(),
            x: e.tip.x,
            y: e.tip.y,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_table(path: &Path, table: &CalibrationTable) -> Result<()> {
    write_table(File::create(path)?, table)?;
    log::info!("wrote {} table rows to {}", table.len(), path.display());
    Ok(())
}

/// Reads a table CSV for the mechanism `expected`.
///
/// If the file carries a mechanism comment, it must match. Malformed rows
/// are skipped and counted, but a table with no good rows at all is an error.
pub fn read_table(mut r: impl BufRead, expected: &Config) -> Result<Loaded<CalibrationTable>> {
    let mut first = String::new();
    r.read_line(&mut first)?;
    if let Some(stamp) = first.trim().strip_prefix('#') {
        check_stamp(stamp.trim(), expected)?;
        first.clear();
    }
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(first).chain(r));
    check_header(&mut rdr, TABLE_HEADER)?;

    let mut entries = Vec::new();
    let mut rejected_rows = 0;
    for row in rdr.deserialize::<TableRow>() {
        match row {
            Ok(row) if [row.theta_l, row.theta_r, row.x, row.y].iter().all(|v| v.is_finite()) => {
                entries.push(TableEntry {
                    pose: LinkagePose::from_degrees(row.theta_l, row.theta_r),
                    tip: Point::new(row.x, row.y),
                })
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            _ => rejected_rows += 1,
        }
    }
    if rejected_rows > 0 {
        log::warn!("skipped {rejected_rows} malformed table rows");
    }
    if entries.is_empty() {
        return Err(LutError::EmptyTable);
    }
    Ok(Loaded {
        value: CalibrationTable {
            config: *expected,
            entries,
        },
        rejected_rows,
    })
}

pub fn load_table(path: &Path, expected: &Config) -> Result<Loaded<CalibrationTable>> {
    let loaded = read_table(BufReader::new(File::open(path)?), expected)?;
    log::info!(
        "loaded {} table rows from {}",
        loaded.value.len(),
        path.display()
    );
    Ok(loaded)
}

pub fn save_index(path: &Path, index: &IndexedTable) -> Result<()> {
    let bytes = postcard::to_allocvec(index)?;
    std::fs::write(path, bytes)?;
    log::info!("wrote index over {} entries to {}", index.tree.len(), path.display());
    Ok(())
}

/// Loads a binary index, checking that it was built for `expected`.
///
/// The returned table carries `expected`, so a different step angle is
/// picked up from the caller's mechanism.
pub fn load_index(path: &Path, expected: &Config) -> Result<IndexedTable> {
    let bytes = std::fs::read(path)?;
    let mut index: IndexedTable = postcard::from_bytes(&bytes)?;
    if !mechanism_matches(&index.table.config, expected) {
        return Err(LutError::MechanismMismatch {
            expected: mechanism_stamp(expected),
            found: mechanism_stamp(&index.table.config),
        });
    }
    if index.table.is_empty() {
        return Err(LutError::EmptyTable);
    }
    index.table.config = *expected;
    Ok(index)
}

/// Writes resolved curves, leaving the angle columns empty for unreachable points.
pub fn write_resolved(w: impl Write, curves: &[ResolvedCurve]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(RESOLVED_HEADER.split(','))?;
    for c in curves {
        for (i, p) in c.points.iter().enumerate() {
            wtr.serialize(ResolvedRow {
                curve_id: c.id,
                index: i,
                x: p.point.x,
                y: p.point.y,
                theta_l: p.pose.map(|pose| pose.left.to_degrees()),
                theta_r: p.pose.map(|pose| pose.right.to_degrees()),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_resolved(path: &Path, curves: &[ResolvedCurve]) -> Result<()> {
    write_resolved(File::create(path)?, curves)
}

pub fn read_resolved(r: impl Read) -> Result<Loaded<Vec<ResolvedCurve>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(r);
    check_header(&mut rdr, RESOLVED_HEADER)?;

    let mut curves: Vec<ResolvedCurve> = Vec::new();
    let mut rejected_rows = 0;
    for row in rdr.deserialize::<ResolvedRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => {
                rejected_rows += 1;
                continue;
            }
        };
        let Some(point) = resolved_point(&row) else {
            rejected_rows += 1;
            continue;
        };
        match curves.last_mut() {
            Some(c) if c.id == row.curve_id => c.points.push(point),
            _ => curves.push(Curve::new(row.curve_id, vec![point])),
        }
    }
    if rejected_rows > 0 {
        log::warn!("skipped {rejected_rows} malformed resolved rows");
    }
    Ok(Loaded {
        value: curves,
        rejected_rows,
    })
}

pub fn load_resolved(path: &Path) -> Result<Loaded<Vec<ResolvedCurve>>> {
    read_resolved(File::open(path)?)
}

// Both angles or neither: a row with just one is malformed.
fn resolved_point(row: &ResolvedRow) -> Option<ResolvedPoint> {
    let pose = match (row.theta_l, row.theta_r) {
        (None, None) => None,
        (Some(l), Some(r)) => Some(LinkagePose::from_degrees(l, r)),
        _ => return None,
    };
    Some(ResolvedPoint {
        point: kurbo::Point::new(row.x, row.y),
        pose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{AngleGrid, SafetyLimits};
    use fivebar_geom::{Angle, ConfigBuilder, LenExt};

    fn small_table() -> CalibrationTable {
        let grid = AngleGrid {
            min: -180.0,
            max: 180.0,
            step: 18.0,
        };
        CalibrationTable::build(&Config::default(), &grid, &SafetyLimits::default())
    }

    #[test]
    fn table_round_trip() {
        let table = small_table();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        save_table(&path, &table).unwrap();

        let loaded = load_table(&path, &Config::default()).unwrap();
        assert_eq!(loaded.rejected_rows, 0);
        assert_eq!(loaded.value.len(), table.len());
        for (a, b) in loaded.value.entries.iter().zip(&table.entries) {
            assert!((a.pose.left.to_degrees() - b.pose.left.to_degrees()).abs() < 1e-9);
            assert!((a.pose.right.to_degrees() - b.pose.right.to_degrees()).abs() < 1e-9);
            assert_eq!(a.tip, b.tip);
        }
    }

    #[test]
    fn table_without_stamp() {
        let text = "theta_L,theta_R,x,y\n40,60,-35.5,114.9\nnope\n1,2,3\n";
        let loaded = read_table(text.as_bytes(), &Config::default()).unwrap();
        assert_eq!(loaded.rejected_rows, 2);
        assert_eq!(loaded.value.len(), 1);
        assert_eq!(loaded.value.entries[0].tip, Point::new(-35.5, 114.9));
    }

    #[test]
    fn table_for_another_mechanism() {
        let text = "# l1=65 l2=85 d=50 offset=25\ntheta_L,theta_R,x,y\n40,60,-35.5,114.9\n";
        let other = ConfigBuilder::default().with_pen_offset(30.0.mm()).build();
        assert!(matches!(
            read_table(text.as_bytes(), &other),
            Err(LutError::MechanismMismatch { .. })
        ));
        assert!(read_table(text.as_bytes(), &Config::default()).is_ok());
    }

    #[test]
    fn empty_table() {
        let text = "theta_L,theta_R,x,y\nbad,row,here,x\n";
        assert!(matches!(
            read_table(text.as_bytes(), &Config::default()),
            Err(LutError::EmptyTable)
        ));
        assert!(matches!(
            read_table("x,y\n".as_bytes(), &Config::default()),
            Err(LutError::Header { .. })
        ));
    }

    #[test]
    fn index_round_trip() {
        let indexed = IndexedTable::new(small_table());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.idx");
        save_index(&path, &indexed).unwrap();

        let loaded = load_index(&path, &Config::default()).unwrap();
        assert_eq!(loaded.table, indexed.table);
        assert_eq!(loaded.tree, indexed.tree);

        let other = ConfigBuilder::default().with_first_link(70.0.mm()).build();
        assert!(matches!(
            load_index(&path, &other),
            Err(LutError::MechanismMismatch { .. })
        ));
    }

    #[test]
    fn index_ignores_step_angle() {
        let indexed = IndexedTable::new(small_table());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.idx");
        save_index(&path, &indexed).unwrap();

        let half_steps = ConfigBuilder::default()
            .with_step_angle(Angle::degrees(0.9))
            .build();
        let loaded = load_index(&path, &half_steps).unwrap();
        assert_eq!(loaded.table.config, half_steps);
        assert_eq!(loaded.table.entries, indexed.table.entries);
        assert!(mechanism_matches(&Config::default(), &half_steps));
    }

    #[test]
    fn table_with_quotes_and_crlf() {
        let text = "# l1=65 l2=85 d=50 offset=25\r\n\
                    \"theta_L\",\"theta_R\",\"x\",\"y\"\r\n\
                    40,60,\"-35.5\",114.9\r\n\
                    41,NaN,0,0\r\n";
        let loaded = read_table(text.as_bytes(), &Config::default()).unwrap();
        assert_eq!(loaded.rejected_rows, 1);
        assert_eq!(loaded.value.entries[0].tip, Point::new(-35.5, 114.9));
    }

    #[test]
    fn half_resolved_rows_are_rejected() {
        let text = "curve_id,index,x,y,theta_L,theta_R\n1,0,1,2,40,\n1,1,1,2,,\n";
        let loaded = read_resolved(text.as_bytes()).unwrap();
        assert_eq!(loaded.rejected_rows, 1);
        assert_eq!(loaded.value[0].points.len(), 1);
        assert_eq!(loaded.value[0].points[0].pose, None);
    }

    #[test]
    fn resolved_round_trip() {
        let curves = vec![
            Curve::new(
                2,
                vec![
                    ResolvedPoint {
                        point: kurbo::Point::new(1.0, 2.0),
                        pose: Some(LinkagePose::from_degrees(40.0, 60.0)),
                    },
                    ResolvedPoint {
                        point: kurbo::Point::new(3.0, 4.0),
                        pose: None,
                    },
                ],
            ),
            Curve::new(
                5,
                vec![ResolvedPoint {
                    point: kurbo::Point::new(-1.5, 0.25),
                    pose: Some(LinkagePose::from_degrees(-3.6, 90.0)),
                }],
            ),
        ];
        let mut buf = Vec::new();
        write_resolved(&mut buf, &curves).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().nth(2).unwrap(), "2,1,3.0,4.0,,");

        let loaded = read_resolved(buf.as_slice()).unwrap();
        assert_eq!(loaded.rejected_rows, 0);
        assert_eq!(loaded.value.len(), 2);
        assert_eq!(loaded.value[0].points[1].pose, None);
        assert_eq!(loaded.value[1].id, 5);
        let pose = loaded.value[0].points[0].pose.unwrap();
        assert!((pose.left.to_degrees() - 40.0).abs() < 1e-9);
    }
}

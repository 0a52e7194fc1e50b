use std::{
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context as _};
use clap::{Args, Parser, Subcommand};
use fivebar_curves::{csv as curve_csv, svg as curve_svg, Layout, RawCurve, ResolvedCurve};
use fivebar_geom::{Config, LinkagePose};
use fivebar_lut::{
    io as lut_io, AngleGrid, CalibrationTable, IndexedTable, Interference, LinearScan,
    Resolver, ResolverConfig, SafetyCheck, SafetyLimits, SpatialIndex,
};
use fivebar_protocol::{csv as step_csv, discretize, export, replay::replay};
use indicatif::{ProgressBar, ProgressStyle};
use kurbo::Vec2;
use log::LevelFilter;

mod mechanism;
mod preview;

#[derive(Parser)]
#[command(about = "Turns line drawings into motor steps for a five-bar pen plotter")]
struct Cli {
    /// JSON file describing the arm. Uses the standard arm if omitted.
    #[arg(long, global = true)]
    mechanism: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweeps the angle grid and saves the calibration table.
    Table(TableArgs),
    /// Lays out curves, resolves them against a table, and writes step commands.
    Plan(PlanArgs),
    /// Prints forward kinematics for one pose.
    Fk {
        /// Left motor angle, in degrees.
        #[arg(allow_negative_numbers = true)]
        left: f64,
        /// Right motor angle, in degrees.
        #[arg(allow_negative_numbers = true)]
        right: f64,
    },
    /// Converts a step CSV into a C array initializer.
    ExportC {
        steps: PathBuf,
        /// Where to write the array. Prints to stdout if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replays a step CSV through forward kinematics and draws the result.
    Preview {
        steps: PathBuf,
        #[arg(short, long, default_value = "preview.svg")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct TableArgs {
    /// Where to write the table CSV.
    #[arg(short, long, default_value = "table.csv")]
    output: PathBuf,
    /// Also write a binary index (table plus k-d tree) here.
    #[arg(long)]
    index: Option<PathBuf>,
    #[arg(long, default_value_t = -180.0, allow_negative_numbers = true)]
    min_angle: f64,
    #[arg(long, default_value_t = 180.0, allow_negative_numbers = true)]
    max_angle: f64,
    #[arg(long, default_value_t = 1.8)]
    angle_step: f64,
}

#[derive(Args)]
struct PlanArgs {
    /// A curve CSV (`curve_id,index,x,y`) or an SVG.
    input: PathBuf,
    /// Where to write the step CSV.
    #[arg(short, long, default_value = "steps.csv")]
    output: PathBuf,

    /// A calibration table CSV.
    #[arg(long, conflicts_with = "index", required_unless_present = "index")]
    table: Option<PathBuf>,
    /// A binary index, as written by `table --index`.
    #[arg(long)]
    index: Option<PathBuf>,

    /// Also dump the laid-out curves.
    #[arg(long)]
    curves_out: Option<PathBuf>,
    /// Also dump the resolved curves, with their angles.
    #[arg(long)]
    resolved_out: Option<PathBuf>,

    #[command(flatten)]
    layout: LayoutArgs,
    #[command(flatten)]
    resolve: ResolveArgs,
}

#[derive(Args)]
struct LayoutArgs {
    /// Take the input coordinates as millimetres on the page, and skip layout.
    #[arg(long)]
    no_layout: bool,
    #[arg(long, default_value_t = 250)]
    target_points: usize,
    #[arg(long, default_value_t = 90.0, allow_negative_numbers = true)]
    rotate: f64,
    #[arg(long, default_value_t = 100.0)]
    page_width: f64,
    #[arg(long, default_value_t = 148.0)]
    page_height: f64,
    #[arg(long, default_value_t = 0)]
    smoothing: usize,
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    offset_x: f64,
    #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
    offset_y: f64,
    #[arg(long, default_value_t = 3)]
    round_digits: u32,
    /// Flattening tolerance for SVG input, in input units.
    #[arg(long, default_value_t = 0.5)]
    flatten: f64,
}

impl LayoutArgs {
    fn layout(&self) -> Layout {
        let mut layout = Layout::default();
        layout
            .with_target_points(self.target_points)
            .with_rotation(self.rotate)
            .with_page(self.page_width, self.page_height)
            .with_smoothing(self.smoothing)
            .with_offset(Vec2::new(self.offset_x, self.offset_y))
            .with_round_digits(self.round_digits);
        layout
    }
}

#[derive(Args)]
struct ResolveArgs {
    /// How far from the target a table pose may draw, in mm.
    #[arg(long, default_value_t = 1.0)]
    tolerance: f64,
    /// Only consider this many of the nearest table entries.
    #[arg(long)]
    max_candidates: Option<usize>,
    /// Trust the table's recorded pen positions without re-running kinematics.
    #[arg(long)]
    no_verify: bool,
    /// Search the table linearly instead of through the k-d tree.
    #[arg(long)]
    linear: bool,
    /// Re-check every candidate pose against the safety limits.
    #[arg(long)]
    recheck: bool,
}

impl ResolveArgs {
    fn config(&self) -> ResolverConfig {
        ResolverConfig {
            tolerance: self.tolerance,
            max_candidates: self.max_candidates,
            verify: !self.no_verify,
        }
    }
}

fn bar(len: u64, msg: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len).with_message(msg);
    if let Ok(style) = ProgressStyle::with_template("{msg:>10} [{bar:40}] {pos}/{len} ({eta})") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn build_table(config: &Config, args: &TableArgs) -> anyhow::Result<()> {
    let grid = AngleGrid {
        min: args.min_angle,
        max: args.max_angle,
        step: args.angle_step,
    };
    if grid.values().is_empty() {
        return Err(anyhow!("the angle grid is empty"));
    }

    let progress = bar(grid.values().len() as u64, "sweeping");
    let table =
        CalibrationTable::build_with_progress(config, &grid, &SafetyLimits::default(), |done, _| {
            progress.set_position(done as u64)
        });
    progress.finish();

    if table.is_empty() {
        log::warn!("no pose on the grid is safe; the table is empty");
    }
    lut_io::save_table(&args.output, &table)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    if let Some(path) = &args.index {
        lut_io::save_index(path, &IndexedTable::new(table))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn load_input(args: &PlanArgs) -> anyhow::Result<Vec<RawCurve>> {
    let is_svg = args
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    let curves = if is_svg {
        curve_svg::load_svg(&args.input, args.layout.flatten)?
    } else {
        let loaded = curve_csv::load_curves(&args.input)?;
        if loaded.rejected_rows > 0 {
            log::warn!(
                "{} rows of {} were rejected",
                loaded.rejected_rows,
                args.input.display()
            );
        }
        loaded.value
    };
    if curves.is_empty() {
        return Err(anyhow!("{} has no curves", args.input.display()));
    }
    Ok(curves)
}

fn load_indexed(config: &Config, args: &PlanArgs) -> anyhow::Result<IndexedTable> {
    if let Some(path) = &args.index {
        return lut_io::load_index(path, config)
            .with_context(|| format!("failed to load index {}", path.display()));
    }
    let path = args
        .table
        .as_deref()
        .ok_or_else(|| anyhow!("either --table or --index is needed"))?;
    let loaded = lut_io::load_table(path, config)
        .with_context(|| format!("failed to load table {}", path.display()))?;
    if loaded.rejected_rows > 0 {
        log::warn!("{} table rows were rejected", loaded.rejected_rows);
    }
    Ok(IndexedTable::new(loaded.value))
}

fn run_resolver<I: SpatialIndex, C: Interference>(
    mut resolver: Resolver<'_, I, C>,
    curves: &[RawCurve],
) -> Vec<ResolvedCurve> {
    let total: usize = curves.iter().map(|c| c.points.len()).sum();
    let progress = bar(total as u64, "resolving");
    let resolved =
        resolver.resolve_all_with_progress(curves, |done, _| progress.set_position(done as u64));
    progress.finish();
    resolved
}

fn resolve_with<I: SpatialIndex>(
    indexed: &IndexedTable,
    index: I,
    args: &ResolveArgs,
    curves: &[RawCurve],
) -> Vec<ResolvedCurve> {
    let resolver = Resolver::new(&indexed.table, index).with_config(args.config());
    if args.recheck {
        run_resolver(
            resolver.with_interference(SafetyCheck {
                config: indexed.table.config,
                limits: SafetyLimits::default(),
            }),
            curves,
        )
    } else {
        run_resolver(resolver, curves)
    }
}

fn plan(config: &Config, args: &PlanArgs) -> anyhow::Result<()> {
    let curves = load_input(args)?;
    let curves = if args.layout.no_layout {
        curves
    } else {
        args.layout.layout().prepare(curves)?
    };
    if let Some(path) = &args.curves_out {
        curve_csv::save_curves(path, &curves)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let indexed = load_indexed(config, args)?;
    log::info!("table has {} entries", indexed.table.len());
    let resolved = if args.resolve.linear {
        let scan = LinearScan::new(&indexed.table.entries);
        resolve_with(&indexed, scan, &args.resolve, &curves)
    } else {
        resolve_with(&indexed, &indexed.tree, &args.resolve, &curves)
    };
    if let Some(path) = &args.resolved_out {
        lut_io::save_resolved(path, &resolved)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let steps = discretize(&resolved, config);
    step_csv::save_steps(&args.output, &steps)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(())
}

fn forward(config: &Config, left: f64, right: f64) {
    let pose = LinkagePose::from_degrees(left, right);
    println!("pose        ({left}°, {right}°)");
    println!("steps       {:?}", config.pose_to_steps(&pose));
    match config.forward(&pose) {
        Ok(tip) => {
            println!("left tip    ({:.3}, {:.3})", tip.left_tip.x, tip.left_tip.y);
            println!("right tip   ({:.3}, {:.3})", tip.right_tip.x, tip.right_tip.y);
            println!("joint       ({:.3}, {:.3})", tip.joint.x, tip.joint.y);
            println!("pen         ({:.3}, {:.3})", tip.pen_tip.x, tip.pen_tip.y);
            let safe = SafetyLimits::default().accepts(config, &tip);
            println!("safe        {safe}");
            if let Some(cands) = config.joint_candidates(tip.joint) {
                println!("poses with the same joint:");
                for c in cands {
                    let pen = config
                        .pen_tip(&c)
                        .map(|p| format!("pen ({:.3}, {:.3})", p.x, p.y))
                        .unwrap_or_else(|e| e.to_string());
                    println!(
                        "  ({:8.3}°, {:8.3}°)  {pen}",
                        c.left.to_degrees(),
                        c.right.to_degrees()
                    );
                }
            }
        }
        Err(e) => println!("infeasible: {e}"),
    }
}

fn export_c(steps: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let file = File::open(steps).with_context(|| format!("failed to open {}", steps.display()))?;
    let cmds = export::scan_rows(BufReader::new(file))?;
    match output {
        Some(path) => {
            let mut w = BufWriter::new(File::create(path)?);
            export::write_c_array(&mut w, &cmds)?;
            w.flush()?;
            log::info!("wrote {} rows to {}", cmds.len(), path.display());
        }
        None => export::write_c_array(std::io::stdout().lock(), &cmds)?,
    }
    Ok(())
}

fn show_preview(config: &Config, steps: &Path, output: &Path) -> anyhow::Result<()> {
    let loaded = step_csv::load_steps(steps)
        .with_context(|| format!("failed to load {}", steps.display()))?;
    if loaded.rejected_rows > 0 {
        log::warn!("{} step rows were rejected", loaded.rejected_rows);
    }
    let strokes = replay(&loaded.value, config);
    preview::save(output, &strokes, config)
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config = mechanism::load(cli.mechanism.as_deref())?;

    match &cli.command {
        Command::Table(args) => build_table(&config, args),
        Command::Plan(args) => plan(&config, args),
        Command::Fk { left, right } => {
            forward(&config, *left, *right);
            Ok(())
        }
        Command::ExportC { steps, output } => export_c(steps, output.as_deref()),
        Command::Preview { steps, output } => show_preview(&config, steps, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plan_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();

        let table_path = dir.path().join("table.csv");
        let index_path = dir.path().join("table.idx");
        build_table(
            &config,
            &TableArgs {
                output: table_path.clone(),
                index: Some(index_path.clone()),
                min_angle: -180.0,
                max_angle: 180.0,
                angle_step: 3.6,
            },
        )
        .unwrap();

        // A short stroke well inside the workspace, already in millimetres.
        let input = dir.path().join("curves.csv");
        std::fs::write(
            &input,
            "curve_id,index,x,y\n1,0,-10,110\n1,1,-5,110\n1,2,0,110\n2,0,1000,1000\n",
        )
        .unwrap();

        let output = dir.path().join("steps.csv");
        let resolved_out = dir.path().join("resolved.csv");
        let args = PlanArgs::parse_from_args(&[
            input.to_str().unwrap(),
            "--index",
            index_path.to_str().unwrap(),
            "--no-layout",
            // The test table is coarse.
            "--tolerance",
            "5",
            "--output",
            output.to_str().unwrap(),
            "--resolved-out",
            resolved_out.to_str().unwrap(),
        ]);
        plan(&config, &args).unwrap();

        let steps = step_csv::load_steps(&output).unwrap().value;
        assert!(!steps.is_empty());
        assert!(steps.iter().all(|s| s.curve_id == 1));

        let resolved = lut_io::load_resolved(&resolved_out).unwrap().value;
        assert_eq!(resolved.len(), 2);
        assert!(resolved[1].points[0].pose.is_none());

        let preview_path = dir.path().join("preview.svg");
        show_preview(&config, &output, &preview_path).unwrap();
        let c_path = dir.path().join("steps.h");
        export_c(&output, Some(&c_path)).unwrap();
        let c = std::fs::read_to_string(&c_path).unwrap();
        assert!(c.starts_with("steps[][3] = {"));
    }

    impl PlanArgs {
        fn parse_from_args(args: &[&str]) -> Self {
            #[derive(Parser)]
            struct Wrapper {
                #[command(flatten)]
                plan: PlanArgs,
            }
            Wrapper::parse_from(std::iter::once("plan").chain(args.iter().copied())).plan
        }
    }
}

use clap::Parser;
use cutlist_optimizer::config::{CalculationRequest, Configuration, EngineConfig, Priority};
use cutlist_optimizer::render;
use cutlist_optimizer::solver::CutListOptimizer;
use cutlist_optimizer::types::PanelSpec;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "cutlist_optimizer",
    about = "Guillotine cut list optimizer for rectangular panels"
)]
struct Cli {
    /// Stock panels as WxH:qty (e.g. 2440x1220:4); qty defaults to 1
    #[arg(long, num_args = 1.., required = true)]
    stock: Vec<String>,

    /// Pieces to cut as WxH:qty (e.g. 800x600:3 400x300:5)
    #[arg(long = "cuts", num_args = 1.., required = true)]
    cuts: Vec<String>,

    /// Material removed by each cut (default: 0)
    #[arg(long, default_value_t = 0)]
    kerf: u32,

    /// Disable piece rotation
    #[arg(long)]
    no_rotate: bool,

    /// Candidate layouts kept per step; 0 derives it from stock usage
    #[arg(long, default_value_t = 0)]
    accuracy: usize,

    /// Ranking criteria, most important first
    #[arg(long, value_enum, num_args = 1..)]
    priority: Vec<Priority>,

    /// Lay everything out on a single stock panel
    #[arg(long)]
    force_one_panel: bool,

    /// Keep exploring combinations with more panels after a full fit
    #[arg(long)]
    all_panel_counts: bool,

    /// Worker threads
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Show ASCII layout of each panel
    #[arg(long)]
    layout: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log search progress to stderr
    #[arg(long)]
    verbose: bool,
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let (width, height) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid dimensions '{}', expected WxH", s))?;
    let width = width
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let height = height
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if width == 0 || height == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok((width, height))
}

fn parse_spec(id: u32, s: &str) -> Result<PanelSpec, String> {
    let (dims, qty) = match s.split_once(':') {
        Some((dims, qty)) => {
            let qty = qty
                .parse::<u32>()
                .map_err(|_| format!("invalid quantity in '{}'", s))?;
            (dims, qty)
        }
        None => (s, 1),
    };
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    let (width, height) = parse_dimensions(dims)?;
    Ok(PanelSpec::new(id, width, height, qty))
}

fn parse_specs(list: &[String]) -> Result<Vec<PanelSpec>, String> {
    list.iter()
        .enumerate()
        .map(|(i, s)| parse_spec(i as u32 + 1, s))
        .collect()
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let stock = parse_specs(&cli.stock).unwrap_or_else(|e| exit_with(e));
    let pieces = parse_specs(&cli.cuts).unwrap_or_else(|e| exit_with(e));

    let configuration = Configuration {
        cut_thickness: cli.kerf,
        allow_tile_rotation: !cli.no_rotate,
        accuracy_factor: cli.accuracy,
        priorities: if cli.priority.is_empty() {
            Priority::defaults()
        } else {
            cli.priority.clone()
        },
        force_one_base_tile: cli.force_one_panel,
        use_minimum_panels: !cli.all_panel_counts,
    };

    let optimizer = CutListOptimizer::new(EngineConfig {
        worker_threads: cli.threads,
        ..EngineConfig::default()
    });
    let solution = optimizer
        .compute(CalculationRequest::new(pieces, stock, configuration))
        .unwrap_or_else(|e| exit_with(e));
    let report = solution.report();

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => exit_with(e),
        }
        return;
    }

    let used: Vec<_> = report.panels.iter().filter(|p| !p.tiles.is_empty()).collect();
    for (i, panel) in used.iter().enumerate() {
        println!("Panel {} ({}x{}):", i + 1, panel.width, panel.height);
        for t in &panel.tiles {
            let rot = if t.rotated { " [rotated]" } else { "" };
            println!("  {}x{} @ ({}, {}){}", t.width, t.height, t.x, t.y, rot);
        }
        println!("  {} cuts", panel.cuts.len());
        if cli.layout {
            print!("{}", render::render_panel(panel));
        }
        println!();
    }

    if !report.no_fit_tiles.is_empty() {
        println!("Unplaced:");
        for t in &report.no_fit_tiles {
            println!("  {}", t);
        }
        println!();
    }

    let total = report.used_area + report.wasted_area;
    let waste = if total == 0 {
        0.0
    } else {
        report.wasted_area as f64 / total as f64 * 100.0
    };
    println!(
        "Summary: {} panel{} used, {} cuts, {:.1}% waste",
        used.len(),
        if used.len() == 1 { "" } else { "s" },
        report.total_cuts,
        waste,
    );
}

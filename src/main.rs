use anyhow::{Context, Result};
use clap::Parser;
use incident_sim::simulation::{LevelConfig, SimWorld, METRIC_ERROR_RATE, METRIC_LATENCY};
use ordered_float::OrderedFloat;

#[derive(Parser)]
#[command(name = "incident_sim")]
#[command(about = "Headless incident-response simulation")]
struct Cli {
    /// Level file (JSON)
    #[arg(long, default_value = "levels/checkout.json")]
    level: String,

    /// Number of ticks to run
    #[arg(long, default_value = "60")]
    ticks: u64,

    /// Seed overriding the level's own seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print a summary every N ticks (0 disables)
    #[arg(long, default_value = "10")]
    summary_every: u64,

    /// Print the final snapshot as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,incident_sim=info"),
    )
    .init();

    let cli = Cli::parse();
    let level = LevelConfig::from_path(&cli.level)?;
    let seed = cli.seed.or(level.seed);
    let mut world = SimWorld::from_level_with_seed(level, seed)
        .with_context(|| format!("Failed to start level {}", cli.level))?;

    run_headless(&mut world, &cli)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(world: &mut SimWorld, cli: &Cli) -> Result<()> {
    if !cli.json {
        println!("Running '{}' in headless mode...", world.level_name());
        println!("Ticks: {}", cli.ticks);
        println!();
    }

    for _ in 0..cli.ticks {
        world.tick();

        if cli.json {
            continue;
        }
        for notification in world.notifications() {
            println!("[tick {}] {}", notification.tick, notification.message);
        }
        let tick = world.current_tick();
        if cli.summary_every > 0 && tick % cli.summary_every == 0 && tick < cli.ticks {
            println!("--- After tick {} ---", tick);
            print_summary(world);
            println!();
        }
    }

    if cli.json {
        let snapshot = serde_json::to_string_pretty(&world.snapshot())
            .context("Failed to serialize snapshot")?;
        println!("{}", snapshot);
    } else {
        println!("=== Final State ===");
        print_summary(world);
    }
    Ok(())
}

fn print_summary(world: &SimWorld) {
    println!(
        "Tick {} | cost {:.2} | open tickets {}",
        world.current_tick(),
        world.total_cost(),
        world.open_tickets().count()
    );

    // Worst error rate first
    let mut components: Vec<_> = world.components().collect();
    components.sort_by_key(|c| {
        std::cmp::Reverse(OrderedFloat(
            c.state.metric_value(METRIC_ERROR_RATE).unwrap_or(0.0),
        ))
    });
    for component in components {
        let state = &component.state;
        println!(
            "  {:<20} {:<12} {:?}  errors {:>6.2}%  latency {:>8.2}ms",
            state.name,
            component.type_name(),
            state.status,
            state.metric_value(METRIC_ERROR_RATE).unwrap_or(0.0),
            state.metric_value(METRIC_LATENCY).unwrap_or(0.0),
        );
    }

    for traffic in world.traffics() {
        let tally = traffic.tally();
        println!(
            "  {:<20} sent {:>6} ok {:>6} failed {:>6}",
            traffic.id,
            tally.sent,
            tally.successful,
            tally.failed()
        );
    }

    for ticket in world.open_tickets() {
        println!("  {} [{:?}] {}", ticket.id, ticket.status, ticket.title);
    }
}

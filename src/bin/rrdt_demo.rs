// RRdT* path planning demo
//
// usage: rrdt_demo [config.toml]

use log::{error, info};

use rrdt_planner::mapping::CircleWorld;
use rrdt_planner::utils::Visualizer;
use rrdt_planner::{AreaBounds, PlannerConfig, PlannerResult, Point2D, RrdtPlanner, StepOutcome, Visualizable};

const MAX_ITER: usize = 3000;

fn load_config() -> PlannerResult<PlannerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("loading configuration from {}", path);
            PlannerConfig::from_file(path)
        }
        None => Ok(PlannerConfig::default()),
    }
}

fn run() -> PlannerResult<()> {
    let config = load_config()?;

    let bounds = AreaBounds::new(0.0, 200.0, 0.0, 120.0);
    let world = CircleWorld::from_obstacles(
        bounds,
        vec![
            (50.0, 30.0, 18.0),
            (50.0, 90.0, 18.0),
            (100.0, 60.0, 22.0),
            (150.0, 25.0, 15.0),
            (150.0, 95.0, 15.0),
            (175.0, 60.0, 10.0),
        ],
    )
    .with_robot_radius(1.0);
    let obstacles = world.obstacles().to_vec();

    let start = Point2D::new(10.0, 60.0);
    let goal = Point2D::new(190.0, 60.0);
    let mut planner = RrdtPlanner::new(start, goal, bounds, world, config)?;

    let mut solved_at = None;
    for i in 0..MAX_ITER {
        if let StepOutcome::Added { .. } = planner.plan_step() {
            if solved_at.is_none() && planner.incumbent_cost().is_finite() {
                solved_at = Some(i);
                info!("first solution after {} iterations, cost {:.2}", i, planner.incumbent_cost());
            }
        }
        if i % 500 == 0 {
            info!(
                "iter {}: {} nodes, {} disjoint trees, cost {:.2}",
                i,
                planner.node_count(),
                planner.disjoint_tree_count(),
                planner.incumbent_cost()
            );
        }
    }

    let stats = planner.stats();
    info!(
        "sampled {}, invalid {}, added {}, merges {}, restarts {} ({} folded)",
        stats.sampled,
        stats.invalid(),
        stats.added,
        stats.merges,
        stats.restarts,
        stats.folds
    );

    let path = planner.get_best_path();
    if path.is_empty() {
        info!("no path found within {} iterations", MAX_ITER);
    } else {
        info!("path with {} points, length {:.2}", path.len(), path.total_length());
    }

    let mut vis = Visualizer::new();
    vis.set_title("RRdT* Path Planning");
    vis.plot_circles(&obstacles);
    planner.visualize(&mut vis);
    std::fs::create_dir_all("img/path_planning")?;
    vis.save_png("img/path_planning/rrdt_result.png", 800, 600)?;
    info!("plot saved to img/path_planning/rrdt_result.png");
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() outside tests; a failed step logs and exits instead.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

// Demo driver:
// 1. Load capacities and demo parameters from the environment
// 2. Insert 1..=N into a fresh tree, print its Graphviz description on stdout
// 3. Delete 1..=N and confirm the tree is empty again
// 4. Run a seeded simulation against a reference model
//
// Logs go to stderr so stdout stays a valid dot file.

use bptree::config::DemoConfig;
use bptree::index::{BPlusTree, TreeError};
use bptree::simulation::{Simulator, SimulatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bptree=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment variables
    let config = match DemoConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: max_internal_fanout={}, max_leaf_entries={}, demo_keys={}",
        config.tree.max_internal_fanout,
        config.tree.max_leaf_entries,
        config.demo_keys
    );

    let mut tree = match BPlusTree::with_config(config.tree) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::error!("Failed to create tree: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = fill(&mut tree, config.demo_keys) {
        tracing::error!("Insert failed: {e}");
        std::process::exit(1);
    }
    if let Err(violation) = tree.check_invariants() {
        tracing::error!("Tree invariant violated after inserts: {violation}");
        std::process::exit(1);
    }
    tracing::info!(
        keys = tree.len(),
        height = tree.height(),
        "inserted demo keys"
    );

    print!("{}", tree.dot());

    if let Err(e) = drain(&mut tree, config.demo_keys) {
        tracing::error!("Delete failed: {e}");
        std::process::exit(1);
    }
    if !tree.is_empty() {
        tracing::error!("Tree still holds {} keys after deleting all", tree.len());
        std::process::exit(1);
    }
    tracing::info!("deleted demo keys, tree is empty");

    let simulation = SimulatorConfig::new(config.simulation_seed)
        .with_tree_config(config.tree)
        .with_check_interval(100)
        .with_drain();
    let mut simulator = match Simulator::new(simulation) {
        Ok(simulator) => simulator,
        Err(e) => {
            tracing::error!("Failed to create simulator: {e}");
            std::process::exit(1);
        }
    };

    let result = simulator.run(config.simulation_operations);
    tracing::info!(
        seed = result.seed,
        operations = result.operations_run,
        inserts = result.stats.inserts,
        updates = result.stats.updates,
        deletes = result.stats.deletes,
        "simulation finished"
    );
    if !result.passed() {
        tracing::error!(
            "Simulation failed: error={:?}, discrepancies={:?}",
            result.error,
            result.discrepancies
        );
        std::process::exit(1);
    }
}

fn fill(tree: &mut BPlusTree<u32, String>, keys: u32) -> Result<(), TreeError> {
    for key in 1..=keys {
        tree.insert(key, key.to_string())?;
    }
    Ok(())
}

fn drain(tree: &mut BPlusTree<u32, String>, keys: u32) -> Result<(), TreeError> {
    for key in 1..=keys {
        tree.delete(&key)?;
    }
    Ok(())
}

//! # costify
//!
//! Command-line front end over a Costify database.
//!
//! ## Usage
//! ```bash
//! costify [--config PATH] [--db PATH] <COMMAND>
//!
//! costify ingredients                 # list ingredients
//! costify recipes                     # list recipes with stored totals
//! costify cost custard                # line-by-line cost at current prices
//! costify reprice milk 8.00           # update a price and run the cascade
//! costify relay                       # deliver events left in the outbox
//! costify prune                       # delete old dispatched events
//! costify units                       # list supported units
//! costify watch                       # keep the dispatcher running until Ctrl+C
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use costify_core::{Id, IngredientChanges, Money, ValidationError};
use costify_db::{Database, DbConfig};
use costify_events::{
    init_logging, CostifyConfig, CostingService, DeliveryOutcome, EventDispatcher,
    IngredientChangeCascade, SqliteStore,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "costify")]
#[command(version)]
#[command(about = "Recipe costing over a Costify database", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides the config
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List ingredients
    Ingredients,

    /// List recipes with their stored totals
    Recipes,

    /// Show the cost breakdown of a recipe
    Cost {
        #[arg(value_parser = parse_id)]
        recipe_id: Id,
    },

    /// Change an ingredient's package price and cascade
    Reprice {
        #[arg(value_parser = parse_id)]
        id: Id,

        /// New package price, e.g. 8.00
        price: Money,
    },

    /// Deliver undispatched outbox events
    Relay,

    /// Delete dispatched events past retention
    Prune,

    /// List supported units
    Units,

    /// Run the event dispatcher until Ctrl+C
    Watch,
}

fn parse_id(value: &str) -> Result<Id, ValidationError> {
    Id::new(value)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = CostifyConfig::load(cli.config)?;
    if let Some(path) = cli.db {
        config.database.path = path;
    }
    init_logging(&config.logging.filter);

    let db_config = if config.database.path.as_os_str() == ":memory:" {
        DbConfig::in_memory()
    } else {
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections)
    };
    let db = Database::new(db_config).await?;
    info!(path = %config.database.path.display(), "Database ready");

    let store = Arc::new(SqliteStore::new(db.clone()));
    let cascade = IngredientChangeCascade::new(store.clone(), store.clone(), config.cascade.clone());
    let (mut dispatcher, gateway) =
        EventDispatcher::new(Arc::new(cascade), store.clone(), config.gateway.clone());
    let service = CostingService::new(store.clone(), store, gateway.clone());

    match cli.command {
        Commands::Ingredients => {
            for ingredient in service.list_ingredients().await? {
                println!(
                    "{:<38} {:<20} {} {} for {}",
                    ingredient.id(),
                    ingredient.name(),
                    ingredient.package_quantity(),
                    ingredient.package_unit(),
                    ingredient.package_price()
                );
            }
        }
        Commands::Recipes => {
            for recipe in service.list_recipes().await? {
                println!(
                    "{:<38} {:<20} {:>10}  v{}",
                    recipe.id(),
                    recipe.name(),
                    recipe.total_cost().to_string(),
                    recipe.version()
                );
            }
        }
        Commands::Cost { recipe_id } => {
            let cost = service.recipe_cost(&recipe_id).await?;
            println!("{}", cost.recipe_name);
            for line in &cost.ingredient_costs {
                println!(
                    "  {:<20} {:>8} {:<12} {:>10}",
                    line.ingredient_name,
                    line.quantity_used,
                    line.unit.to_string(),
                    line.cost.to_string()
                );
            }
            println!("  {:<42} {:>10}", "Total", cost.total_cost.to_string());
        }
        Commands::Reprice { id, price } => {
            let updated = service
                .update_ingredient(&id, IngredientChanges::price(price))
                .await?;
            println!("{} now costs {}", updated.name(), updated.package_price());

            print_outcomes(&dispatcher.drain().await?);
        }
        Commands::Relay => {
            print_outcomes(&dispatcher.drain().await?);
        }
        Commands::Prune => {
            let pruned = dispatcher.prune().await?;
            println!("Pruned {} dispatched events", pruned);
        }
        Commands::Units => {
            for unit in service.list_units() {
                println!(
                    "{:<12} {:<8} x{}",
                    unit.code(),
                    unit.dimension().to_string(),
                    unit.factor_to_base()
                );
            }
        }
        Commands::Watch => {
            let task = dispatcher.spawn();
            println!("Dispatcher running. Press Ctrl+C to stop.");
            tokio::signal::ctrl_c().await?;
            gateway.shutdown().await;
            task.await?;
        }
    }

    db.close().await;
    Ok(())
}

fn print_outcomes(outcomes: &[DeliveryOutcome]) {
    for outcome in outcomes {
        match outcome {
            DeliveryOutcome::Delivered(report) => {
                for update in &report.updated {
                    println!(
                        "  {:<38} {} -> {}",
                        update.recipe_id, update.previous_total, update.new_total
                    );
                }
                for failure in &report.failures {
                    println!("  {:<38} FAILED: {}", failure.recipe_id, failure.error);
                }
                println!(
                    "Cascade for {}: {} updated, {} unchanged, {} failed",
                    report.ingredient_id,
                    report.updated.len(),
                    report.unchanged.len(),
                    report.failures.len()
                );
            }
            DeliveryOutcome::AlreadyClaimed => {}
            DeliveryOutcome::Released { error } => println!("Delivery deferred: {}", error),
            DeliveryOutcome::GaveUp { error } => println!("Delivery abandoned: {}", error),
        }
    }
}

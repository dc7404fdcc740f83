//! # Seed Data Generator
//!
//! Populates a database with a small pantry and a few recipes whose totals
//! are computed with the real calculator.
//!
//! ## Usage
//! ```bash
//! cargo run -p costify-db --bin seed
//!
//! # Specify database path
//! cargo run -p costify-db --bin seed -- --db ./data/costify.db
//! ```
//!
//! ## Generated Data
//! ```text
//! Ingredients (fixed ids)           Recipes
//! ─────────────────────────         ─────────────────────────────────────
//! flour   1 kg     $5.00            custard     0.5 L milk + 0.2 kg sugar
//! sugar   1 kg     $3.00            hot-milk    0.3 L milk
//! milk    1 L      $5.00            shortbread  300 g flour + 8 tbsp butter
//! butter  250 g    $4.39                        + 100 g sugar
//! eggs    12 un    $3.60            omelette    3 un eggs + 1 tbsp butter
//! ```

use std::collections::HashMap;
use std::env;

use costify_core::{CostCalculator, Id, Ingredient, Money, Recipe, RecipeIngredient, Unit};
use costify_db::{Database, DbConfig};

/// (id, name, package quantity, package price, package unit)
const INGREDIENTS: &[(&str, &str, f64, f64, Unit)] = &[
    ("flour", "Flour", 1.0, 5.00, Unit::Kg),
    ("sugar", "Sugar", 1.0, 3.00, Unit::Kg),
    ("milk", "Milk", 1.0, 5.00, Unit::L),
    ("butter", "Butter", 250.0, 4.39, Unit::G),
    ("eggs", "Eggs", 12.0, 3.60, Unit::Un),
];

/// (id, name, lines of (ingredient id, quantity, unit))
const RECIPES: &[(&str, &str, &[(&str, f64, Unit)])] = &[
    ("custard", "Custard", &[("milk", 0.5, Unit::L), ("sugar", 0.2, Unit::Kg)]),
    ("hot-milk", "Hot Milk", &[("milk", 0.3, Unit::L)]),
    (
        "shortbread",
        "Shortbread",
        &[
            ("flour", 300.0, Unit::G),
            ("butter", 8.0, Unit::TbspButter),
            ("sugar", 100.0, Unit::G),
        ],
    ),
    ("omelette", "Omelette", &[("eggs", 3.0, Unit::Un), ("butter", 1.0, Unit::TbspButter)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./costify_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Costify Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./costify_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Costify Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.ingredients().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} ingredients", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut pantry = HashMap::new();
    for (id, name, quantity, price, unit) in INGREDIENTS {
        let ingredient = Ingredient::new(Id::new(*id)?, name, *quantity, Money::of(*price)?, *unit)?;
        db.ingredients().insert(&ingredient).await?;
        println!("  + {:<8} {} {} for {}", id, quantity, unit, ingredient.package_price());
        pantry.insert(ingredient.id().clone(), ingredient);
    }

    println!();
    let calculator = CostCalculator::new();
    for (id, name, lines) in RECIPES {
        let lines = lines
            .iter()
            .map(|(ingredient, quantity, unit)| RecipeIngredient::new(Id::new(*ingredient)?, *quantity, *unit))
            .collect::<Result<Vec<_>, _>>()?;
        let mut recipe = Recipe::new(Id::new(*id)?, name, lines)?;

        let cost = calculator.calculate(&recipe, &pantry)?;
        recipe.update_total_cost(cost.total_cost);
        db.recipes().insert(&recipe).await?;
        println!("  + {:<10} {}", id, cost.total_cost);
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

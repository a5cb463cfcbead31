//! Load a small city dataset and drive it the way a faceted view would:
//! compute facets over the visible items, narrow, and recompute.
//!
//! Run with: `cargo run -p vitrine-facets --example browse`

use serde_json::json;
use vitrine::Database;
use vitrine_facets::{range_facet, value_facet, Browser};

fn main() {
    let mut database = Database::new();
    database.load_data(
        &json!({
            "types": {
                "City": { "label": "City", "pluralLabel": "Cities" }
            },
            "properties": {
                "population": { "valueType": "number", "label": "population" },
                "founded": { "valueType": "date", "label": "founded" }
            },
            "items": [
                { "label": "Paris", "type": "City", "country": "France",
                  "population": 2148000, "founded": "0250-01-01" },
                { "label": "Lyon", "type": "City", "country": "France",
                  "population": 513000 },
                { "label": "Lagos", "type": "City", "country": "Nigeria",
                  "population": 14862000 },
                { "label": "Kyoto", "type": "City", "country": "Japan",
                  "population": 1464000, "founded": "0794-01-01" }
            ]
        }),
        "http://example.org/cities/",
    );

    let mut browser = Browser::new(database);

    println!("All items: {:?}", browser.visible_items().to_vec());

    println!("\nCountry facet:");
    for row in value_facet(browser.database(), "country", None) {
        println!("  {:10} {}", row.value, row.count);
    }

    if let Some(population) = range_facet(browser.database(), "population", None) {
        println!(
            "\nPopulation: {} items between {} and {}",
            population.count, population.min, population.max
        );
    }

    browser.add_range_filter("population", 1_000_000.0, f64::INFINITY, false);
    let visible = browser.visible_items();
    println!("\nCities over a million: {:?}", visible.to_vec());

    println!("Country facet over the narrowed pool:");
    for row in value_facet(browser.database(), "country", Some(&visible)) {
        println!("  {:10} {}", row.value, row.count);
    }
}

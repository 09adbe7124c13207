/// Scrolling Example
///
/// This example demonstrates:
/// - A grid over a large flat record set
/// - Frame-coalesced scrolling through a small slot pool
/// - How few slots each scroll step actually reassigns
/// - Debounced filtering driven by a manual clock

use livegrid::{Grid, GridConfig, ManualClock};
use serde_json::json;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();
    println!("=== LiveGrid Scrolling Example ===\n");

    let n = 200_000;

    // 1. Build rows
    println!("1. Building {} rows...", n);
    let start = Instant::now();
    let mut config = GridConfig::from_json(
        r#"{"columns": [{"field": "id", "type": "number"}, {"field": "label"}]}"#,
    )
    .unwrap();
    config.rows = (0..n)
        .map(|i| json!({"id": i, "label": format!("row {}", i)}))
        .collect();
    let clock = ManualClock::new();
    let mut grid = Grid::with_clock(config, clock.clone()).unwrap();
    println!("   Built in {:?}", start.elapsed());
    println!(
        "   {} render slots for {} rows, content height {}px\n",
        grid.viewport().slot_count(),
        n,
        grid.viewport().total_height()
    );

    // 2. Scroll bursts
    println!("2. Scrolling...");
    let mut top = 0.0;
    for frame in 0..8 {
        // Several scroll events land before each frame; only the last counts.
        for _ in 0..5 {
            top += 180.0;
            grid.scroll(top);
        }
        grid.tick();
        let viewport = grid.viewport();
        println!(
            "   frame {}: scroll {:>6}px, window starts at row {:>4}, {} slots reassigned",
            frame,
            viewport.scroll_top(),
            viewport.first_position(),
            viewport.last_reassigned()
        );
    }
    println!();

    // 3. Jump
    println!("3. Jumping to row 150000...");
    let offset = grid.scroll_to_index(150_000, false).unwrap();
    println!(
        "   offset {}px, {} slots reassigned\n",
        offset,
        grid.viewport().last_reassigned()
    );

    // 4. Debounced filter
    println!("4. Typing a filter...");
    for text in ["row 1", "row 12", "row 123"] {
        grid.set_filter(text, false);
        clock.advance(Duration::from_millis(10));
        println!("   typed '{}', refresh pending: {}", text, grid.is_refresh_pending());
    }
    clock.advance(Duration::from_millis(50));
    grid.tick();
    println!(
        "   after debounce: {} visible rows\n",
        grid.viewport().visible_row_indices().len()
    );

    println!("=== Example Complete ===");
}

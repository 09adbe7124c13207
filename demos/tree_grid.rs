/// Tree Grid Example
///
/// This example demonstrates:
/// - Building a grid from nested records
/// - Expanding and collapsing rows
/// - Filtering, sorting and grouping
/// - Selecting rows and saving the view state
///
/// Run with `RUST_LOG=debug` to see each refresh pass.

use livegrid::{Frame, Grid, GridConfig, Modifiers, Renderer};
use serde_json::json;

/// Prints the rows the slots currently show, indented by level.
struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&mut self, frame: &Frame<'_>) {
        let mut lines: Vec<(f64, String)> = frame
            .rows()
            .map(|(slot, row)| {
                let marker = if row.is_loading() {
                    "…"
                } else if row.has_children() && row.is_expanded() {
                    "▾"
                } else if row.has_children() {
                    "▸"
                } else {
                    " "
                };
                let label = if row.is_row_group() {
                    format!("[{}] ({} rows)", row.data()["dept"], row.child_count_total())
                } else {
                    format!("{} ({})", row.data()["name"], row.data()["role"])
                };
                let selected = if row.is_selected() { "*" } else { " " };
                (
                    slot.top(),
                    format!("{}{}{} {}", selected, "  ".repeat(row.level()), marker, label),
                )
            })
            .collect();
        lines.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, line) in lines {
            println!("   {}", line);
        }
        println!();
    }
}

fn main() {
    env_logger::init();
    println!("=== LiveGrid Tree Example ===\n");

    // 1. Configure the grid
    println!("1. Creating grid...");
    let config = GridConfig::from_json(
        r#"{
            "columns": [
                {"field": "name", "title": "Name", "pinned": "left"},
                {"field": "role"},
                {"field": "dept"},
                {"field": "remote", "type": "boolean"}
            ],
            "selectionMethod": "multi",
            "deselectWhenCollapse": true,
            "refreshDebounceMs": 0
        }"#,
    )
    .unwrap();
    let mut grid = Grid::new(config).unwrap();
    grid.set_renderer(TextRenderer);

    // 2. Load an org chart
    println!("2. Loading rows...");
    grid.set_rows(
        vec![
            json!({"name": "Ada", "role": "CTO", "dept": "eng", "remote": false, "children": [
                {"name": "Grace", "role": "Lead", "dept": "eng", "remote": true, "children": [
                    {"name": "Linus", "role": "Engineer", "dept": "eng", "remote": true},
                    {"name": "Barbara", "role": "Engineer", "dept": "eng", "remote": false}
                ]},
                {"name": "Ken", "role": "Architect", "dept": "eng", "remote": false}
            ]}),
            json!({"name": "Margaret", "role": "CFO", "dept": "finance", "remote": false}),
            json!({"name": "Dennis", "role": "Designer", "dept": null, "remote": true}),
        ],
        false,
    );

    // 3. Collapse a branch
    println!("3. Collapsing Grace...");
    let grace = grid.rows().row_at(1).unwrap().id();
    grid.toggle_row(grace, Some(false));

    // 4. Filter
    println!("4. Filtering for 'engineer' (parents expand)...");
    grid.set_filter("engineer", true);
    grid.flush();

    println!("5. Clearing the filter...");
    grid.set_filter("", false);
    grid.flush();

    // 6. Sort and group
    println!("6. Sorting by name...");
    grid.sort_column("name", false, None).unwrap();

    println!("7. Grouping by dept...");
    grid.group_column("dept", true).unwrap();

    // 8. Select
    println!("8. Selecting two people...");
    let people: Vec<_> = grid
        .rows()
        .rows_in_order()
        .filter(|r| !r.is_row_group())
        .map(|r| r.id())
        .take(2)
        .collect();
    grid.select(people[0], Modifiers::NONE);
    grid.select(people[1], Modifiers::CTRL);
    println!("   Selected: {:?}\n", grid.selected_records());

    // 9. Save the view state
    println!("9. View state:");
    let state = grid.get_config();
    println!("   {}\n", serde_json::to_string(&state).unwrap());

    println!("=== Example Complete ===");
}

//! LiveGrid - Virtualized Hierarchical Grid Core
//!
//! Row model and viewport windowing for a tabular widget over very large,
//! optionally tree-shaped record sets. Rows are filtered, sorted, grouped and
//! selected against one flattened display order, and a fixed pool of render
//! slots is moved over that order as the user scrolls.

pub mod changeset;
pub mod column;
pub mod config;
pub mod error;
pub mod expansion;
pub mod filter;
pub mod grid;
pub mod scheduler;
pub mod selection;
pub mod sort;
pub mod tree;
pub mod util;
pub mod viewport;

pub use changeset::{Changeset, GridChange, IndexAdjuster, IndexedState};
pub use column::{CellValue, Column, ColumnFilter, ColumnType, FilterValue, Pinned, SortDirection};
pub use config::{ColumnDef, ColumnState, GridConfig, GridState, SelectionMethod, SortState};
pub use error::{GridError, Result};
pub use expansion::ExpansionTicket;
pub use filter::{ExternalFilter, FilterEngine, FilterPass};
pub use grid::{AsyncExpandHook, Frame, Grid, GridContext, GridHooks, NoopRenderer, Renderer};
pub use scheduler::{Clock, ManualClock, RefreshScheduler, SystemClock};
pub use selection::{Borders, CellMark, CellRef, Modifiers, RangeRegion, SelectionEngine};
pub use sort::{SortEngine, StatusEntry, StatusKind};
pub use tree::{Expansion, Row, RowId, RowTree, TreeOptions};
pub use viewport::{RenderSlot, ViewportWindow};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn grid_with(rows: Vec<Value>, setup: impl FnOnce(&mut GridConfig)) -> Grid {
        init_logging();
        let mut config = GridConfig::new(vec![
            ColumnDef::new("v"),
            ColumnDef::new("team"),
            ColumnDef::new("size").with_type(ColumnType::Number),
        ]);
        config.rows = rows;
        config.refresh_debounce_ms = 0;
        setup(&mut config);
        Grid::new(config).unwrap()
    }

    fn shown(grid: &Grid) -> Vec<String> {
        grid.viewport()
            .visible_row_indices()
            .iter()
            .map(|&i| {
                let row = grid.rows().row_at(i).unwrap();
                match &row.data()["v"] {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                }
            })
            .collect()
    }

    fn assert_index_permutation(grid: &Grid) {
        let indexes: Vec<usize> = grid.rows().rows_in_order().map(|r| r.index()).collect();
        assert_eq!(indexes, (0..grid.rows().len()).collect::<Vec<_>>());
    }

    fn sample_forest() -> Vec<Value> {
        vec![
            json!({"v": "alpha", "team": "red", "size": 3, "children": [
                {"v": "alpha-1", "team": "red", "size": 1},
                {"v": "alpha-2", "team": "blue", "size": 9, "children": [
                    {"v": "alpha-2-x", "team": "blue", "size": 4}
                ]}
            ]}),
            json!({"v": "beta", "team": "blue", "size": 7}),
            json!({"v": "gamma", "team": null, "size": 5, "children": [
                {"v": "gamma-1", "team": "red", "size": 2}
            ]}),
        ]
    }

    #[test]
    fn test_filter_scenario_flat_rows() {
        let mut grid = grid_with(vec![json!({"v": "2"}), json!({"v": "3"}), json!({"v": "4"})], |_| {});
        grid.set_filter("2", false);
        assert_eq!(shown(&grid), vec!["2"]);
        assert!(grid.rows().row_at(0).unwrap().is_visible_after_filter());
        grid.set_filter("", false);
        assert_eq!(shown(&grid), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_collapse_scenario_with_deselect() {
        let rows = vec![json!({"v": "A", "children": [{"v": "B"}, {"v": "C"}]})];
        let mut grid = grid_with(rows, |c| {
            c.expand_nodes_by_default = false;
            c.deselect_when_collapse = true;
            c.selection_method = SelectionMethod::Multi;
        });
        let a = grid.rows().row_at(0).unwrap().id();
        let b = grid.rows().row_at(1).unwrap().id();
        assert!(!grid.row(b).unwrap().is_visible());
        assert!(!grid.rows().row_at(2).unwrap().is_visible());
        assert_eq!(shown(&grid), vec!["A"]);

        assert!(grid.toggle_row(a, None));
        assert_eq!(shown(&grid), vec!["A", "B", "C"]);

        grid.select(b, Modifiers::NONE);
        assert_eq!(grid.selected_rows(), vec![b]);
        assert!(grid.toggle_row(a, None));
        assert!(grid.selected_rows().is_empty());
        assert_eq!(shown(&grid), vec!["A"]);
    }

    #[test]
    fn test_index_permutation_after_every_operation() {
        let mut grid = grid_with(sample_forest(), |c| c.selection_method = SelectionMethod::Multi);
        assert_index_permutation(&grid);

        grid.sort_column("size", false, None).unwrap();
        assert_index_permutation(&grid);
        grid.group_column("team", true).unwrap();
        assert_index_permutation(&grid);
        grid.set_filter("alpha", true);
        assert_index_permutation(&grid);

        let beta = grid
            .rows()
            .rows_in_order()
            .find(|r| r.data()["v"] == "beta")
            .unwrap()
            .id();
        grid.add_row(Some(beta), json!({"v": "beta-1", "team": "blue", "size": 1}));
        assert_index_permutation(&grid);
        grid.remove_row(beta);
        assert_index_permutation(&grid);

        grid.group_column("team", false).unwrap();
        grid.sort_column("size", false, None).unwrap();
        grid.sort_column("size", false, None).unwrap();
        assert_index_permutation(&grid);
    }

    #[test]
    fn test_filter_monotonic_for_prefix_extension() {
        let rows: Vec<Value> = ["abc", "abd", "bcd", "abcd", "xabc", "ab"]
            .iter()
            .map(|v| json!({ "v": v }))
            .collect();
        let mut grid = grid_with(rows, |_| {});
        let mut previous: HashSet<String> = shown(&grid).into_iter().collect();
        for text in ["a", "ab", "abc", "abcd"] {
            grid.set_filter(text, false);
            let now: HashSet<String> = shown(&grid).into_iter().collect();
            assert!(now.is_subset(&previous), "{} widened the result", text);
            previous = now;
        }
        assert_eq!(previous, HashSet::from(["abcd".to_string()]));
    }

    #[test]
    fn test_filter_idempotence() {
        let mut grid = grid_with(sample_forest(), |_| {});
        assert!(grid.set_filter("gamma", false).ran());
        assert!(!grid.is_filter_changed());
        assert_eq!(grid.set_filter("gamma", false), FilterPass::Skipped);
        assert_eq!(shown(&grid), vec!["gamma", "gamma-1"]);
    }

    #[test]
    fn test_column_filter_through_grid() {
        let mut grid = grid_with(sample_forest(), |_| {});
        grid.set_column_filter("team", ColumnFilter::text("BLUE")).unwrap();
        // alpha-2's ancestor stays in, its subtree comes along.
        assert_eq!(shown(&grid), vec!["alpha", "alpha-2", "alpha-2-x", "beta"]);
        assert!(grid.set_column_filter("missing", ColumnFilter::default()).is_err());
    }

    #[test]
    fn test_sort_noop_is_stable() {
        let mut grid = grid_with(sample_forest(), |_| {});
        grid.sort_column("v", false, Some(SortDirection::Desc)).unwrap();
        let first = shown(&grid);
        grid.sort_column("v", false, Some(SortDirection::Desc)).unwrap();
        assert_eq!(shown(&grid), first);
        assert_eq!(
            first,
            vec!["gamma", "gamma-1", "beta", "alpha", "alpha-2", "alpha-2-x", "alpha-1"]
        );
    }

    #[test]
    fn test_grouping_through_grid() {
        let mut grid = grid_with(sample_forest(), |_| {});
        grid.group_column("team", true).unwrap();
        let groups: Vec<String> = grid
            .rows()
            .rows_in_order()
            .filter(|r| r.is_row_group())
            .map(|r| r.data()["team"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(groups, vec!["[Empty]", "blue", "red"]);
        assert_eq!(grid.get_config().group_by, vec!["team"]);

        // Group rows never match directly.
        grid.set_filter("red", false);
        let red_group = grid
            .rows()
            .rows_in_order()
            .find(|r| r.is_row_group() && r.data()["team"] == "red")
            .unwrap();
        assert!(red_group.is_visible_after_filter());
        grid.set_filter("[Empty]", false);
        assert!(shown(&grid).is_empty());
    }

    #[test]
    fn test_single_mode_exclusivity_through_grid() {
        let mut grid = grid_with(sample_forest(), |_| {});
        let ids: Vec<RowId> = grid.rows().rows_in_order().map(|r| r.id()).collect();
        for (n, id) in ids.iter().enumerate() {
            let modifiers = if n % 2 == 0 { Modifiers::CTRL } else { Modifiers::SHIFT };
            grid.select(*id, modifiers);
            assert!(grid.selected_rows().len() <= 1);
        }
        grid.select_all();
        assert!(grid.selected_rows().len() <= 1);
    }

    #[test]
    fn test_preselected_rows_and_leaf_only_selection() {
        let rows = vec![
            json!({"v": "p", "selected": true, "children": [{"v": "c", "selected": true}]}),
            json!({"v": "q"}),
        ];
        let mut grid = grid_with(rows, |c| {
            c.select_leaves_only = true;
            c.selection_method = SelectionMethod::Multi;
        });
        let c = grid.rows().row_at(1).unwrap().id();
        assert_eq!(grid.selected_rows(), vec![c]);
        assert_eq!(grid.selected_records()[0]["v"], "c");

        grid.set_rows(vec![json!({"v": "fresh", "selected": 1})], false);
        assert_eq!(grid.selected_rows().len(), 1);
        assert!(grid.row(c).is_none());
    }

    #[test]
    fn test_range_selection_rectangle() {
        let rows = (0..20).map(|i| json!({ "v": i })).collect();
        let mut grid = grid_with(rows, |c| c.selection_method = SelectionMethod::Range);
        grid.begin_range(8, 2, false).unwrap();
        grid.extend_range(5, 0);
        grid.extend_range(3, 1);
        let region = grid.end_range().unwrap();
        assert_eq!(region.bounds(), (CellRef::new(3, 1), CellRef::new(8, 2)));

        let mut marked = 0;
        for row in 0..20 {
            for col in 0..3 {
                let inside = (3..=8).contains(&row) && (1..=2).contains(&col);
                assert_eq!(grid.cell_mark(row, col).is_some(), inside);
                marked += usize::from(inside);
            }
        }
        assert_eq!(marked, 12);
        assert!(grid.clear_ranges());
        assert!(grid.cell_mark(3, 1).is_none());
    }

    #[test]
    fn test_window_bound_per_scroll_event() {
        for rows in [100usize, 1_000_000] {
            let mut window = ViewportWindow::new(28.0, 600.0, None);
            window.set_visible_rows((0..rows).collect());
            window.calculate_row_position(true);
            let pool = window.slot_count();
            let mut top = 0.0;
            for step in 0..500 {
                top = (top + if step % 11 == 0 { 9_001.0 } else { 57.0 }) % (rows as f64 * 28.0);
                assert!(window.rearrange_list_nodes(top) <= pool);
                let on_screen = (window.scroll_top() / 28.0).floor() as usize;
                if on_screen < rows {
                    assert!(window.slot_for_row(on_screen).is_some());
                }
            }
        }
    }

    #[test]
    fn test_grid_scroll_keeps_screen_covered() {
        let rows = (0..5_000).map(|i| json!({ "v": i })).collect();
        let mut grid = grid_with(rows, |c| {
            c.row_height = 20.0;
            c.viewport_height = 200.0;
        });
        for top in [0.0, 35.0, 400.0, 401.0, 15_000.0, 99_990.0, 120.0] {
            grid.scroll(top);
            grid.tick();
            let viewport = grid.viewport();
            let first = (viewport.scroll_top() / 20.0).floor() as usize;
            let last = ((viewport.scroll_top() + 200.0) / 20.0).ceil() as usize;
            for row in first..last.min(5_000) {
                assert!(viewport.slot_for_row(row).is_some(), "row {} uncovered at {}", row, top);
            }
        }
    }

    #[test]
    fn test_add_and_remove_rows_renumber() {
        let mut grid = grid_with(sample_forest(), |_| {});
        let alpha = grid.rows().row_at(0).unwrap().id();
        let added = grid.add_row(Some(alpha), json!({"v": "alpha-3"})).unwrap();
        assert_eq!(grid.row(added).unwrap().index(), 4);
        assert_eq!(grid.row(alpha).unwrap().child_count_total(), 4);
        assert_eq!(grid.rows().row_at(5).unwrap().data()["v"], "beta");

        let alpha_2 = grid.rows().row_at(2).unwrap().id();
        assert!(grid.remove_row(alpha_2));
        assert_eq!(grid.row(alpha).unwrap().child_count_total(), 2);
        assert_eq!(
            shown(&grid),
            vec!["alpha", "alpha-1", "alpha-3", "beta", "gamma", "gamma-1"]
        );
        assert_eq!(
            grid.take_changes(),
            vec![
                GridChange::RowsInserted { index: 4, count: 1 },
                GridChange::RowsRemoved { index: 2, count: 2 },
            ]
        );
    }

    #[test]
    fn test_view_state_round_trip() {
        let mut grid = grid_with(sample_forest(), |c| c.viewport_height = 56.0);
        grid.set_column_width("v", 220.0).unwrap();
        grid.sort_column("size", false, Some(SortDirection::Desc)).unwrap();
        grid.group_column("team", true).unwrap();
        grid.set_column_filter("team", ColumnFilter::one_of(["red", "blue"])).unwrap();
        grid.scroll(28.0);
        grid.tick();
        let state = grid.get_config();

        let json = serde_json::to_string(&state).unwrap();
        let restored: GridState = serde_json::from_str(&json).unwrap();

        let mut other = grid_with(sample_forest(), |c| c.viewport_height = 56.0);
        other.set_config(&restored).unwrap();
        assert_eq!(other.get_config(), state);
        assert_eq!(shown(&other), shown(&grid));
        assert_eq!(other.column("v").unwrap().width(), 220.0);

        let mut bad = restored.clone();
        bad.group_by = vec!["nope".to_string()];
        assert!(matches!(other.set_config(&bad), Err(GridError::UnknownColumn(_))));
        assert_eq!(other.get_config(), state);
    }

    #[test]
    fn test_external_filter_hook() {
        let mut grid = grid_with(sample_forest(), |_| {});
        grid.set_external_filter(Some(Box::new(|row: &Row| {
            row.data()["size"].as_f64().map_or(false, |s| s > 4.0)
        })));
        assert_eq!(shown(&grid), vec!["alpha", "alpha-2", "alpha-2-x", "beta", "gamma", "gamma-1"]);
        grid.set_external_filter(None);
        assert_eq!(shown(&grid).len(), 7);
    }

    #[test]
    fn test_async_expand_with_renderer() {
        let rows = vec![json!({"v": "lazy"})];
        let mut grid = grid_with(rows, |c| c.expand_nodes_by_default = false);
        let painted = Rc::new(RefCell::new(Vec::<Vec<String>>::new()));

        struct Capture(Rc<RefCell<Vec<Vec<String>>>>);
        impl Renderer for Capture {
            fn render(&mut self, frame: &Frame<'_>) {
                let mut rows: Vec<(usize, String)> = frame
                    .rows()
                    .map(|(slot, row)| {
                        let label = if row.is_loading() { "…".to_string() } else { row.data()["v"].to_string() };
                        (slot.row_index().unwrap_or(0), label)
                    })
                    .collect();
                rows.sort();
                self.0.borrow_mut().push(rows.into_iter().map(|(_, l)| l).collect());
            }
        }
        grid.set_renderer(Capture(painted.clone()));

        let pending = Rc::new(RefCell::new(None));
        let slot = pending.clone();
        grid.set_async_expand(move |_, ticket| *slot.borrow_mut() = Some(ticket));
        let lazy = grid.rows().row_at(0).unwrap().id();
        grid.toggle_row(lazy, None);
        assert_eq!(painted.borrow().last().unwrap(), &vec!["…".to_string()]);

        let ticket = pending.borrow_mut().take().unwrap();
        grid.complete_expansion(ticket, vec![json!({"v": "loaded"})]);
        assert_eq!(
            painted.borrow().last().unwrap(),
            &vec!["\"lazy\"".to_string(), "\"loaded\"".to_string()]
        );
    }

    fn team_rows() -> Vec<Value> {
        vec![
            json!({"v": "a", "team": "red"}),
            json!({"v": "b", "team": "red"}),
            json!({"v": "c", "team": "blue"}),
        ]
    }

    fn group_id(grid: &Grid, team: &str) -> RowId {
        grid.rows()
            .rows_in_order()
            .find(|r| r.is_row_group() && r.data()["team"] == team)
            .unwrap()
            .id()
    }

    #[test]
    fn test_remove_group_row_takes_its_members() {
        let mut grid = grid_with(team_rows(), |_| {});
        grid.group_column("team", true).unwrap();
        grid.take_changes();

        assert!(grid.remove_row(group_id(&grid, "red")));
        assert_eq!(grid.rows().len(), 2);
        assert_index_permutation(&grid);
        assert_eq!(shown(&grid), vec!["", "c"]);
        assert!(grid.rows().rows_in_order().all(|r| r.data()["team"] == "blue"));
        assert_eq!(
            grid.pending_changes(),
            &[
                GridChange::RowsRemoved { index: 2, count: 3 },
                GridChange::OrderRebuilt
            ]
        );
    }

    #[test]
    fn test_add_under_group_row_is_filed_by_value() {
        let mut grid = grid_with(team_rows(), |_| {});
        grid.group_column("team", true).unwrap();

        let blue = group_id(&grid, "blue");
        let d = grid.add_row(Some(blue), json!({"v": "d", "team": "blue"})).unwrap();
        assert_index_permutation(&grid);
        assert_eq!(grid.rows().len(), 6);
        assert_eq!(grid.rows().parent_of(d).unwrap().data()["team"], "blue");
        assert_eq!(grid.row(d).unwrap().level(), 1);
        assert_eq!(shown(&grid), vec!["", "c", "d", "", "a", "b"]);

        // The grouped value decides the bucket, not the row it was added under.
        let blue = group_id(&grid, "blue");
        let e = grid.add_row(Some(blue), json!({"v": "e", "team": "red"})).unwrap();
        assert_index_permutation(&grid);
        assert_eq!(grid.rows().parent_of(e).unwrap().data()["team"], "red");
        assert_eq!(shown(&grid), vec!["", "c", "d", "", "a", "b", "e"]);
    }

    #[test]
    fn test_toggle_group_row_skips_async_hook() {
        let mut grid = grid_with(team_rows(), |_| {});
        grid.group_column("team", true).unwrap();
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        grid.set_async_expand(move |_, _| *counter.borrow_mut() += 1);

        let blue = group_id(&grid, "blue");
        assert!(grid.toggle_row(blue, Some(false)));
        assert_index_permutation(&grid);
        assert_eq!(shown(&grid), vec!["", "", "a", "b"]);

        assert!(grid.toggle_row(blue, Some(true)));
        assert_eq!(*calls.borrow(), 0);
        assert!(grid.row(blue).unwrap().is_expanded());
        assert_index_permutation(&grid);
        assert_eq!(shown(&grid), vec!["", "c", "", "a", "b"]);
    }

    #[test]
    fn test_async_expansion_beside_group_rows() {
        let rows = vec![
            json!({"v": "lazy", "team": "red", "children": []}),
            json!({"v": "c", "team": "blue"}),
        ];
        let mut grid = grid_with(rows, |c| c.expand_nodes_by_default = false);
        grid.group_column("team", true).unwrap();
        let pending = Rc::new(RefCell::new(None));
        let slot = pending.clone();
        grid.set_async_expand(move |_, ticket| *slot.borrow_mut() = Some(ticket));

        let red = group_id(&grid, "red");
        grid.toggle_row(red, Some(true));
        assert!(pending.borrow().is_none());
        let lazy = grid
            .rows()
            .rows_in_order()
            .find(|r| r.data()["v"] == "lazy")
            .unwrap()
            .id();
        grid.toggle_row(lazy, Some(true));
        let ticket = pending.borrow_mut().take().unwrap();
        assert!(grid.complete_expansion(ticket, vec![json!({"v": "kid", "team": "red"})]));
        assert_index_permutation(&grid);
        assert_eq!(grid.rows().len(), 5);
        let kid = grid.rows().row_at(4).unwrap();
        assert_eq!(kid.data()["v"], "kid");
        assert_eq!(kid.level(), 2);
    }

    #[test]
    fn test_inserted_selected_marker_keeps_single_mode_exclusive() {
        let mut grid = grid_with(team_rows(), |c| c.selection_method = SelectionMethod::Single);
        let a = grid.rows().row_at(0).unwrap().id();
        grid.select(a, Modifiers::NONE);
        let x = grid
            .add_row(None, json!({"v": "x", "selected": true}))
            .unwrap();
        assert_eq!(grid.selected_rows(), vec![x]);
    }

    #[test]
    fn test_set_rows_reset_config() {
        let mut grid = grid_with(sample_forest(), |_| {});
        grid.sort_column("v", false, None).unwrap();
        grid.set_filter("beta", false);
        grid.set_rows(vec![json!({"v": "z"}), json!({"v": "beta"}), json!({"v": "a"})], false);
        assert_eq!(shown(&grid), vec!["beta"]);

        grid.set_rows(vec![json!({"v": "z"}), json!({"v": "a"})], true);
        assert_eq!(shown(&grid), vec!["z", "a"]);
        assert!(grid.sort_engine().is_empty());
        assert_eq!(grid.global_filter(), "");
    }
}

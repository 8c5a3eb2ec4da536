//! Local and global search through the engine.

mod common;

use std::sync::Arc;

use common::{assert_progress_well_formed, engine, test_config, write_file, Recorder};
use tabseek_core::cancel::CancellationToken;
use tabseek_core::progress::NoProgress;
use tabseek_core::types::Scalar;
use tabseek_exec::result::{ROW_INDEX_COLUMN, SOURCE_COLUMN, TABLE_COLUMN};
use tabseek_exec::{progress_channel, Engine, ExecError};

#[test]
fn test_local_search_matches_numeric_cells_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "people.csv",
        "id,name,age\n1,Alice,30\n2,Bob,25\n3,Carol,30\n",
    );
    let engine = engine();
    engine.load(path.as_path(), &NoProgress).unwrap();

    let hits = engine.search_local("people.csv", "people", "30", 100).unwrap();
    assert_eq!(hits.row_indices, vec![0, 2]);
    assert!(!hits.truncated);
    assert_eq!(hits.rows.row_count(), 2);
    assert_eq!(hits.rows.row(0)[1], Scalar::Str("Alice".into()));
    assert_eq!(hits.rows.row(1)[1], Scalar::Str("Carol".into()));
}

#[test]
fn test_local_search_is_case_insensitive_and_capped() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = String::from("id,title\n");
    for i in 0..50 {
        let title = if i % 2 == 0 { "Widget Pro" } else { "gadget" };
        body.push_str(&format!("{i},{title}\n"));
    }
    let path = write_file(dir.path(), "catalog.csv", &body);
    let engine = engine();
    engine.load(path.as_path(), &NoProgress).unwrap();

    let hits = engine.search_local("catalog.csv", "catalog", "WIDGET", 10).unwrap();
    assert_eq!(hits.match_count(), 10);
    assert!(hits.truncated);
    assert_eq!(hits.row_indices, (0..20).step_by(2).collect::<Vec<_>>());

    let all = engine.search_local("catalog.csv", "catalog", "widget", 1000).unwrap();
    assert_eq!(all.match_count(), 25);
    assert!(!all.truncated);
}

#[test]
fn test_local_search_blank_term_and_unknown_targets() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.csv", "a,b\nx,y\n");
    let engine = engine();
    engine.load(path.as_path(), &NoProgress).unwrap();

    let blank = engine.search_local("t.csv", "t", "   ", 10).unwrap();
    assert_eq!(blank.match_count(), 0);
    assert_eq!(blank.rows.num_columns(), 2);

    assert!(matches!(
        engine.search_local("nope.csv", "t", "x", 10),
        Err(ExecError::UnknownSource(_))
    ));
    assert!(matches!(
        engine.search_local("t.csv", "missing", "x", 10),
        Err(ExecError::UnknownTable { .. })
    ));
}

#[test]
fn test_indexed_and_scanned_search_agree() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = String::from("id,city,note\n");
    let cities = ["Lisbon", "Oslo", "Lima", "Osaka", "Lyon"];
    for i in 0..400 {
        body.push_str(&format!("{i},{},note {}\n", cities[i % cities.len()], i * 7));
    }
    let path = write_file(dir.path(), "places.csv", &body);

    let lazy = engine();
    lazy.load(path.as_path(), &NoProgress).unwrap();

    let eager = Engine::new(tabseek_core::config::EngineConfig {
        eager_index: true,
        index_min_distinct: 1,
        ..test_config()
    })
    .unwrap();
    eager.load(path.as_path(), &NoProgress).unwrap();
    assert_eq!(eager.stats().indexed_tables, 1);

    for term in ["osl", "LI", "note 14", "ima", "zzz", "7"] {
        let a = lazy.search_local("places.csv", "places", term, 1000).unwrap();
        let b = eager.search_local("places.csv", "places", term, 1000).unwrap();
        assert_eq!(a.row_indices, b.row_indices, "term {term:?}");
    }
}

#[test]
fn test_global_search_counts_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "fruit.csv", "id,item\n1,apple\n2,banana\n");
    let b = write_file(dir.path(), "desserts.csv", "id,item\n1,Apple Pie\n2,cherry tart\n");
    let engine = engine();
    engine.load(a.as_path(), &NoProgress).unwrap();
    engine.load(b.as_path(), &NoProgress).unwrap();

    let result = engine.search_global("apple", 100, &NoProgress, None);
    assert_eq!(result.total_matches, 2);
    assert_eq!(result.tables_searched, 2);
    assert_eq!(result.sources_searched, 2);
    assert!(result.errors.is_empty());
    assert!(!result.cancelled);

    let fruit = result.summary_for("fruit.csv", "fruit").expect("fruit summary");
    assert_eq!(fruit.match_count, 1);
    let desserts = result.summary_for("desserts.csv", "desserts").expect("dessert summary");
    assert_eq!(desserts.match_count, 1);

    let rows = &result.get("desserts.csv", "desserts").expect("dessert rows").rows;
    let names: Vec<&str> = rows.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names[..3], [SOURCE_COLUMN, TABLE_COLUMN, ROW_INDEX_COLUMN]);
    assert_eq!(rows.row(0)[0], Scalar::Str("desserts.csv".into()));
    assert_eq!(rows.row(0)[2], Scalar::I64(0));

    let combined = result.combined().unwrap();
    assert_eq!(combined.row_count(), 2);
}

#[test]
fn test_global_search_keeps_tables_with_provenance_named_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "export.csv", "_source,name\ncrm,Alice\nerp,Bob\n");
    let engine = engine();
    engine.load(path.as_path(), &NoProgress).unwrap();

    let local = engine.search_local("export.csv", "export", "alice", 10).unwrap();
    assert_eq!(local.match_count(), 1);

    let result = engine.search_global("alice", 10, &NoProgress, None);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.total_matches, 1);
    let rows = &result.get("export.csv", "export").expect("export rows").rows;
    let names: Vec<&str> = rows.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![SOURCE_COLUMN, TABLE_COLUMN, ROW_INDEX_COLUMN, "_source_2", "name"]
    );
    assert_eq!(rows.row(0)[0], Scalar::Str("export.csv".into()));
    assert_eq!(rows.row(0)[3], Scalar::Str("crm".into()));
}

#[test]
fn test_global_search_reports_zero_match_tables_in_summary_only() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "hit.csv", "k\nneedle\n");
    let b = write_file(dir.path(), "miss.csv", "k\nhay\n");
    let engine = engine();
    engine.load(a.as_path(), &NoProgress).unwrap();
    engine.load(b.as_path(), &NoProgress).unwrap();

    let result = engine.search_global("needle", 10, &NoProgress, None);
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.summary.len(), 2);
    assert_eq!(result.summary_for("miss.csv", "miss").unwrap().match_count, 0);
}

#[test]
fn test_global_search_respects_per_table_cap() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = String::from("n,label\n");
    for i in 0..30 {
        body.push_str(&format!("{i},match\n"));
    }
    let path = write_file(dir.path(), "many.csv", &body);
    let engine = engine();
    engine.load(path.as_path(), &NoProgress).unwrap();

    let result = engine.search_global("match", 5, &NoProgress, None);
    assert_eq!(result.total_matches, 5);
    let summary = result.summary_for("many.csv", "many").unwrap();
    assert_eq!(summary.match_count, 5);
    assert!(summary.truncated);
    assert_eq!(result.get("many.csv", "many").unwrap().rows.row_count(), 5);
}

#[test]
fn test_global_progress_is_monotonic_and_ends_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    for i in 0..12 {
        let path = write_file(
            dir.path(),
            &format!("part{i}.csv"),
            &format!("id,text\n{i},common row {i}\n"),
        );
        engine.load(path.as_path(), &NoProgress).unwrap();
    }

    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = engine.search_global("common", 10, &sink, None);
    assert_eq!(result.tables_searched, 12);
    assert_eq!(result.total_matches, 12);
    assert_progress_well_formed(&recorder.percents());
}

#[test]
fn test_blank_term_and_empty_registry_still_finish() {
    let engine = engine();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = engine.search_global("anything", 10, &sink, None);
    assert_eq!(result.tables_searched, 0);
    assert_eq!(recorder.percents(), vec![100]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.csv", "a\nx\n");
    engine.load(path.as_path(), &NoProgress).unwrap();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = engine.search_global("", 10, &sink, None);
    assert_eq!(result.total_matches, 0);
    assert_eq!(result.tables_searched, 0);
    assert_eq!(recorder.percents(), vec![100]);
}

#[test]
fn test_cancelled_search_skips_undispatched_tables() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    for i in 0..4 {
        let path = write_file(dir.path(), &format!("c{i}.csv"), "k\nvalue\n");
        engine.load(path.as_path(), &NoProgress).unwrap();
    }

    let token = CancellationToken::new();
    token.cancel();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = engine.search_global("value", 10, &sink, Some(&token));
    assert!(result.cancelled);
    assert_eq!(result.tables_searched, 0);
    assert_eq!(result.total_matches, 0);
    assert_progress_well_formed(&recorder.percents());
}

#[test]
fn test_spawned_search_streams_progress() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    for i in 0..3 {
        let path = write_file(dir.path(), &format!("s{i}.csv"), "k\nstream\n");
        engine.load(path.as_path(), &NoProgress).unwrap();
    }

    let (tx, mut rx) = progress_channel();
    let pending = engine.spawn_search_global("stream", 10, Arc::new(tx));
    let mut percents = Vec::new();
    while let Some(event) = rx.blocking_recv() {
        percents.push(event.percent);
    }
    let result = pending.wait().unwrap();
    assert_eq!(result.total_matches, 3);
    assert_progress_well_formed(&percents);
}

#[test]
fn test_search_outlives_unload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "gone.csv", "k\nkeep\n");
    let engine = engine();
    engine.load(path.as_path(), &NoProgress).unwrap();

    let pending = engine.spawn_search_global("keep", 10, Arc::new(NoProgress));
    engine.unload("gone.csv").unwrap();
    let result = pending.wait().unwrap();
    assert_eq!(result.total_matches, 1);
    assert!(engine.search_global("keep", 10, &NoProgress, None).matches.is_empty());
}

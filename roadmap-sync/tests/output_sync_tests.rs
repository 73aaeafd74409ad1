//! Store → sheet score writes

mod helpers;

use helpers::{registry, seed, set_raw_selection, temp_store, RecordingTransport};
use roadmap_common::{FrameworkId, ScoreTriple};
use roadmap_sync::store::InitiativeStore;
use roadmap_sync::sync::{OutputSync, ScoringOrchestrator};
use roadmap_sync::transport::CellWrite;

const TAB: &str = "Scores";

const RICE_INPUTS: [(&str, f64); 4] = [
    ("rice_reach", 1000.0),
    ("rice_impact", 2.5),
    ("rice_confidence", 0.8),
    ("rice_effort", 5.0),
];

async fn scored_store() -> (tempfile::TempDir, roadmap_sync::db::SqliteInitiativeStore) {
    let (dir, store) = temp_store().await;
    seed(&store, "INIT-001", FrameworkId::Rice, &RICE_INPUTS).await;
    seed(&store, "INIT-002", FrameworkId::Rice, &[]).await;
    let registry = registry();
    ScoringOrchestrator::new(&store, &registry)
        .score_all(None)
        .await
        .unwrap();
    (dir, store)
}

#[tokio::test]
async fn test_writes_only_present_output_columns_in_one_call() {
    let (_dir, store) = scored_store().await;
    let transport = RecordingTransport::with_tab(
        TAB,
        &[
            &["Title", "RICE: Overall Score", "Key", "rice_value_score", "value_score"],
            &["Search", "", "INIT-001", "", ""],
        ],
    );

    let report = OutputSync::new(&store, &transport, TAB)
        .write_scores_to_sheet()
        .await
        .unwrap();

    assert_eq!(transport.apply_calls(), 1);
    assert_eq!(report.cells_written, 2);
    assert_eq!(
        transport.writes(),
        vec![
            CellWrite {
                row: 1,
                column: 1,
                value: 400.0
            },
            CellWrite {
                row: 1,
                column: 3,
                value: 2000.0
            },
        ]
    );
    assert_eq!(transport.cell(TAB, 1, 4), "");
}

#[tokio::test]
async fn test_absent_scores_are_never_written() {
    let (_dir, store) = scored_store().await;
    let transport = RecordingTransport::with_tab(
        TAB,
        &[
            &["Key", "RICE: Overall Score", "WSJF: Overall Score"],
            &["INIT-001", "", "stale"],
            &["INIT-002", "12", ""],
        ],
    );

    OutputSync::new(&store, &transport, TAB)
        .write_scores_to_sheet()
        .await
        .unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].a1(), "B2");
    assert_eq!(transport.cell(TAB, 1, 2), "stale");
    assert_eq!(transport.cell(TAB, 2, 1), "12");
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let (_dir, store) = scored_store().await;
    let transport = RecordingTransport::with_tab(
        TAB,
        &[
            &["Key", "RICE: Value Score", "RICE: Effort Score", "RICE: Overall Score"],
            &["INIT-001", "", "5", ""],
        ],
    );
    let sync = OutputSync::new(&store, &transport, TAB);

    let first = sync.write_scores_to_sheet().await.unwrap();
    assert_eq!(first.cells_written, 2);
    assert_eq!(first.changed, 1);

    let second = sync.write_scores_to_sheet().await.unwrap();
    assert_eq!(second.cells_written, 0);
    assert_eq!(second.changed, 0);
    assert_eq!(transport.apply_calls(), 1);
}

#[tokio::test]
async fn test_unknown_rows_are_skipped_with_warning() {
    let (_dir, store) = scored_store().await;
    let transport = RecordingTransport::with_tab(
        TAB,
        &[
            &["Key", "RICE: Overall Score"],
            &["INIT-404", ""],
            &["INIT-001", ""],
        ],
    );

    let report = OutputSync::new(&store, &transport, TAB)
        .write_scores_to_sheet()
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "not_found");
    assert_eq!(report.failures[0].row, Some(1));
    assert_eq!(transport.writes()[0].row, 2);
}

#[tokio::test]
async fn test_tab_without_score_columns_writes_nothing() {
    let (_dir, store) = scored_store().await;
    let transport =
        RecordingTransport::with_tab(TAB, &[&["Key", "Title"], &["INIT-001", "Search"]]);

    let report = OutputSync::new(&store, &transport, TAB)
        .write_scores_to_sheet()
        .await
        .unwrap();

    assert_eq!(report.cells_written, 0);
    assert_eq!(transport.apply_calls(), 0);
}

#[tokio::test]
async fn test_switching_frameworks_does_not_touch_other_framework_columns() {
    let (_dir, store) = scored_store().await;
    store
        .upsert_framework_scores(
            "INIT-001",
            FrameworkId::Wsjf,
            &ScoreTriple {
                value: 16.0,
                effort: 4.0,
                overall: 4.0,
            },
        )
        .await
        .unwrap();
    store.set_active("INIT-001", FrameworkId::Wsjf).await.unwrap();
    store.mirror_active_scores("INIT-001").await.unwrap();
    store.checkpoint().await.unwrap();

    let transport = RecordingTransport::with_tab(
        TAB,
        &[
            &["Key", "RICE: Overall Score", "WSJF: Overall Score"],
            &["INIT-001", "400", ""],
        ],
    );
    OutputSync::new(&store, &transport, TAB)
        .write_scores_to_sheet()
        .await
        .unwrap();

    assert_eq!(
        transport.writes(),
        vec![CellWrite {
            row: 1,
            column: 2,
            value: 4.0
        }]
    );
}

#[tokio::test]
async fn test_unrecognized_active_selection_still_gets_its_scores_written() {
    let (_dir, store) = scored_store().await;
    set_raw_selection(&store, "INIT-001", "ICE").await;
    let transport = RecordingTransport::with_tab(
        TAB,
        &[
            &["Key", "RICE: Overall Score"],
            &["INIT-001", ""],
            &["INIT-002", ""],
        ],
    );

    let report = OutputSync::new(&store, &transport, TAB)
        .write_scores_to_sheet()
        .await
        .unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(transport.cell(TAB, 1, 1), "400");
}

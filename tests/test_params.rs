//! Parameter hot-reload: atomic snapshot replacement, last-known-good on
//! refresh failure, and the periodic refresh task.

use std::sync::Arc;
use std::time::Duration;

use lanemark::params::{ParameterStore, PipelineParams, spawn_refresh};

/// A full parameter file where every tunable derives from one seed, so a
/// torn read of mixed generations cannot masquerade as a valid snapshot.
fn params_json(seed: u32) -> String {
    format!(
        r#"{{
            "img_size": [{h}, {w}],
            "top_cutoff": {seed},
            "hsv_white1": [0, 0, {seed}],
            "hsv_white2": [180, {seed}, 255],
            "hsv_yellow1": [{seed}, 140, 100],
            "hsv_yellow2": [45, 255, {seed}],
            "hsv_red1": [0, {seed}, 100],
            "hsv_red2": [15, 255, {seed}],
            "hsv_red3": [165, {seed}, 100],
            "hsv_red4": [180, 255, {seed}],
            "dilation_kernel_size": {seed},
            "canny_thresholds": [{seed}, {high}],
            "hough_min_line_length": {seed},
            "hough_max_line_gap": {seed},
            "hough_threshold": {seed}
        }}"#,
        h = seed + 100,
        w = seed + 200,
        high = seed + 1,
    )
}

fn params_for(seed: u32) -> PipelineParams {
    let s = seed as f32;
    PipelineParams {
        img_size: [seed + 100, seed + 200],
        top_cutoff: seed,
        hsv_white1: [0.0, 0.0, s],
        hsv_white2: [180.0, s, 255.0],
        hsv_yellow1: [s, 140.0, 100.0],
        hsv_yellow2: [45.0, 255.0, s],
        hsv_red1: [0.0, s, 100.0],
        hsv_red2: [15.0, 255.0, s],
        hsv_red3: [165.0, s, 100.0],
        hsv_red4: [180.0, 255.0, s],
        dilation_kernel_size: seed,
        canny_thresholds: [s, s + 1.0],
        hough_min_line_length: s,
        hough_max_line_gap: s,
        hough_threshold: seed,
    }
}

#[test]
fn refresh_picks_up_changes() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("params.json");
    std::fs::write(&path, params_json(10))?;

    let store = ParameterStore::from_file(&path)?;
    assert_eq!(*store.current(), params_for(10));

    std::fs::write(&path, params_json(20))?;
    store.refresh();
    assert_eq!(*store.current(), params_for(20));
    Ok(())
}

#[test]
fn refresh_failure_keeps_last_known_good() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("params.json");
    std::fs::write(&path, params_json(10))?;
    let store = ParameterStore::from_file(&path)?;

    std::fs::write(&path, "{ not json")?;
    store.refresh();
    assert_eq!(*store.current(), params_for(10));

    // Deleting the file behaves the same.
    std::fs::remove_file(&path)?;
    store.refresh();
    assert_eq!(*store.current(), params_for(10));
    Ok(())
}

#[test]
fn initial_load_failure_is_an_error() {
    assert!(ParameterStore::from_file("/nonexistent/params.json").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshots_are_never_torn() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("params.json");
    std::fs::write(&path, params_json(1))?;
    let store = Arc::new(ParameterStore::from_file(&path)?);

    let expected = [params_for(1), params_for(2)];

    let writer = {
        let store = store.clone();
        let path = path.clone();
        tokio::task::spawn_blocking(move || {
            for round in 0..200u32 {
                let seed = 1 + round % 2;
                std::fs::write(&path, params_json(seed)).unwrap();
                store.refresh();
            }
        })
    };

    let reader = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || {
            for _ in 0..2000 {
                let snapshot = store.current();
                // Every observed snapshot is one generation in full, never
                // a mix of fields from two generations.
                assert!(
                    expected.iter().any(|p| *p == *snapshot),
                    "torn snapshot: {snapshot:?}"
                );
            }
        })
    };

    writer.await?;
    reader.await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn periodic_refresh_runs_until_store_dropped() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("params.json");
    std::fs::write(&path, params_json(10))?;
    let store = Arc::new(ParameterStore::from_file(&path)?);

    let task = spawn_refresh(Arc::downgrade(&store), Duration::from_millis(10));

    std::fs::write(&path, params_json(30))?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(*store.current(), params_for(30));

    drop(store);
    // With the store gone the task notices on its next tick and ends.
    tokio::time::timeout(Duration::from_secs(1), task).await??;
    Ok(())
}

use ergscore::{
    AthleteProfile, Database, InMemoryPbStore, PbCategory, PersonalBestStore, RawMeasurement,
    WorkoutPipeline, WorkoutSource, WorkoutSubmission,
};
use std::sync::{Arc, Barrier};
use std::thread;

/// Concurrent submissions for one athlete and category must leave the fastest
/// time stored, with exactly one winning write per improvement

const THREADS: usize = 8;
const PER_THREAD: usize = 12;

fn submission(time: f64) -> WorkoutSubmission {
    WorkoutSubmission {
        user_id: "racer".to_string(),
        source: WorkoutSource::Manual,
        measurement: RawMeasurement {
            total_time_seconds: Some(time),
            total_distance_metres: Some(2000.0),
            ..RawMeasurement::default()
        },
        intervals: None,
        achieved_at: None,
    }
}

/// Deterministic spread of 2k times, distinct per (thread, index)
fn time_for(thread: usize, index: usize) -> f64 {
    400.0 + ((thread * 37 + index * 11) % 97) as f64 + thread as f64 * 0.01
}

fn run_concurrently<S: PersonalBestStore + 'static>(
    pipeline: Arc<WorkoutPipeline<S>>,
) -> (f64, usize) {
    let barrier = Arc::new(Barrier::new(THREADS));
    let profile = AthleteProfile::default();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pipeline = Arc::clone(&pipeline);
            let barrier = Arc::clone(&barrier);
            let profile = profile.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut wins = 0;
                for i in 0..PER_THREAD {
                    let processed = pipeline.process(&submission(time_for(t, i)), &profile).unwrap();
                    if processed.personal_best.is_new_record() {
                        wins += 1;
                    }
                }
                wins
            })
        })
        .collect();

    let wins = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let min = (0..THREADS)
        .flat_map(|t| (0..PER_THREAD).map(move |i| time_for(t, i)))
        .fold(f64::INFINITY, f64::min);
    (min, wins)
}

#[test]
fn test_in_memory_store_keeps_minimum() {
    let pipeline = Arc::new(WorkoutPipeline::new(Arc::new(InMemoryPbStore::new())));
    let (min, wins) = run_concurrently(Arc::clone(&pipeline));

    let best = pipeline
        .store()
        .current_best("racer", PbCategory::M2000)
        .unwrap()
        .unwrap();
    assert_eq!(best.time_seconds, min);
    assert!(wins >= 1);
    assert!(wins <= THREADS * PER_THREAD);
}

#[test]
fn test_sqlite_store_keeps_minimum() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Database::new(temp_dir.path().join("pbs.db")).unwrap();
    let pipeline = Arc::new(WorkoutPipeline::new(Arc::new(db)));
    let (min, wins) = run_concurrently(Arc::clone(&pipeline));

    let best = pipeline
        .store()
        .current_best("racer", PbCategory::M2000)
        .unwrap()
        .unwrap();
    assert_eq!(best.time_seconds, min);
    assert!(wins >= 1);
}

/// Duplicate submissions of the same time: only one may win
#[test]
fn test_duplicate_submissions_single_winner() {
    let pipeline = Arc::new(WorkoutPipeline::new(Arc::new(InMemoryPbStore::new())));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pipeline
                    .process(&submission(418.3), &AthleteProfile::default())
                    .unwrap()
                    .personal_best
                    .is_new_record()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

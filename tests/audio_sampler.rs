// tests/audio_sampler.rs

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::fast_config;
use wave_sampler::{AudioSampler, MemorySource};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_never_see_out_of_range_values_while_writing() {
    let config = fast_config().with_pacing(Duration::from_millis(1));
    let mut sampler = AudioSampler::new(config);
    let envelope = sampler.time_sampler();

    sampler
        .load(MemorySource::tone(330.0, 4.0, 22_050, 2, 1.0).with_chunk_frames(512))
        .await;

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|r| {
            let envelope = envelope.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut reads = 0usize;
                let mut t = r as f64 * 0.1;
                while !done.load(Ordering::Relaxed) {
                    let v = envelope.sample(t);
                    assert!((-80.0..=0.0).contains(&v), "read {v} at {t}");
                    if reads % 64 == 0 {
                        let snap = envelope.snapshot();
                        assert!(snap.iter().all(|v| (-80.0..=0.0).contains(v)));
                    }
                    t = (t + 0.013) % 4.5;
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    let outcome = sampler.wait().await.expect("task outcome");
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().expect("reader thread panicked") > 0);
    }
    assert!(outcome.is_completed(), "{outcome}");
    assert_eq!(envelope.len(), 240);
    assert!(envelope.snapshot().iter().any(|&v| v > -80.0));
}

#[tokio::test]
async fn new_load_replaces_previous_extraction() {
    let config = fast_config().with_pacing(Duration::from_millis(20));
    let mut sampler = AudioSampler::new(config);
    let envelope = sampler.time_sampler();

    // Long, loud first track that will not finish before the second load.
    sampler
        .load(MemorySource::tone(100.0, 30.0, 8_000, 1, 0.0).with_chunk_frames(800))
        .await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(sampler.is_loading());

    sampler.load(MemorySource::silence(2.0, 8_000, 1)).await;
    let outcome = sampler.wait().await.expect("second load outcome");

    assert!(outcome.is_completed());
    assert!(!sampler.is_loading());
    assert_eq!(envelope.track_length(), 2.0);
    assert_eq!(envelope.len(), 120);
    // Nothing from the loud track survives in the new envelope.
    assert!(envelope.snapshot().iter().all(|&v| v == -80.0));
}

#[tokio::test]
async fn cancel_returns_partial_outcome() {
    let config = fast_config().with_pacing(Duration::from_millis(20));
    let mut sampler = AudioSampler::new(config);

    sampler
        .load(MemorySource::tone(100.0, 30.0, 8_000, 1, 0.0).with_chunk_frames(800))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = sampler.cancel().await.expect("cancel outcome");
    assert!(outcome.is_cancelled());
    assert!(outcome.written() > 0);
    assert!(outcome.written() < 1_800);

    // Entries written before the cancel stay readable.
    sampler.notify_playing();
    sampler.set_time(0.01);
    assert!(sampler.current_level() > -80.0);
    sampler.set_time(29.0);
    assert_eq!(sampler.current_level(), -80.0);

    assert!(sampler.cancel().await.is_none());
}

#[tokio::test]
async fn failed_load_leaves_silence() {
    let mut sampler = AudioSampler::new(fast_config());
    sampler
        .load(wave_sampler::FileSource::new("/definitely/not/here.wav"))
        .await;
    let outcome = sampler.wait().await.expect("outcome");

    assert!(outcome.error().is_some());
    sampler.notify_playing();
    sampler.set_time(1.0);
    assert_eq!(sampler.current_level(), -80.0);
}

#[tokio::test]
async fn failed_load_clears_previous_track_length() {
    let mut sampler = AudioSampler::new(fast_config());
    let envelope = sampler.time_sampler();

    sampler.load(MemorySource::tone(220.0, 2.0, 8_000, 1, 0.0)).await;
    assert!(sampler.wait().await.expect("first outcome").is_completed());
    assert_eq!(envelope.track_length(), 2.0);

    sampler
        .load(wave_sampler::FileSource::new("/definitely/not/here.wav"))
        .await;
    let outcome = sampler.wait().await.expect("second outcome");

    assert!(outcome.error().is_some());
    assert_eq!(envelope.track_length(), 0.0);
    assert_eq!(envelope.sample(1.0), -80.0);
}

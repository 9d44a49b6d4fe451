//! Concurrent access to the registry

use std::sync::Arc;
use std::thread;
use surge_metrics::MetricsRegistry;

#[test]
fn test_concurrent_threads_count_every_record() {
    let registry = Arc::new(MetricsRegistry::new());
    let threads = 16;
    let per_thread = 2_500;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..per_thread {
                    registry.record("post_kraj", ((t * i) % 250) as f64, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = registry.snapshot();
    let stats = snapshot.step("post_kraj").unwrap();
    assert_eq!(stats.count, (threads * per_thread) as u64);
    assert_eq!(stats.successes, (threads * per_thread) as u64);
    assert_eq!(stats.failures, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_across_keys() {
    let registry = Arc::new(MetricsRegistry::new());
    let mut tasks = Vec::new();

    for task in 0..64 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let key = format!("step_{}", task % 4);
            for _ in 0..100 {
                registry.record(&key, 1.0, task % 2 == 0);
                tokio::task::yield_now().await;
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.steps.len(), 4);
    assert_eq!(snapshot.requests.count, 6_400);
    assert_eq!(snapshot.requests.successes, 3_200);
    for stats in snapshot.steps.values() {
        assert_eq!(stats.count, 1_600);
    }
}

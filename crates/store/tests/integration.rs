//! Integration tests for store crate

#[cfg(all(test, unix))]
mod tests {
    use chrono::Utc;
    use devnet_platform::TokioCommandExecutor;
    use devnet_store::*;
    use devnet_types::ConfigHash;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        path
    }

    fn commit(n: u8) -> String {
        format!("{n:02x}").repeat(20)
    }

    async fn store_script(cache: &BinaryCache, scratch: &Path, n: u8, body: &str) {
        let script = write_script(scratch, &format!("bin-{n}"), body);
        let info = BuildInfo {
            commit_hash: commit(n),
            config_hash: ConfigHash::from_build_settings(&[("n", n.to_string())]),
            git_ref: format!("ref-{n}"),
            build_time: Utc::now(),
        };
        cache.store(&script, &info).await.unwrap();
    }

    fn validator() -> BinaryValidator {
        BinaryValidator::new(Arc::new(TokioCommandExecutor::new()))
    }

    #[tokio::test]
    async fn test_scan_skips_malformed_entries() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache/binaries");
        let cache = BinaryCache::new(&root, "cosmos", "simd");
        store_script(&cache, temp.path(), 1, "echo v1.0.0").await;

        let network_dir = root.join("cosmos");
        tokio::fs::create_dir_all(network_dir.join("not-a-key")).await.unwrap();
        tokio::fs::create_dir_all(network_dir.join(format!("{}-0000000z", commit(2))))
            .await
            .unwrap();
        // Valid key but no binary inside
        tokio::fs::create_dir_all(network_dir.join(format!("{}-00000000", commit(3))))
            .await
            .unwrap();
        tokio::fs::write(network_dir.join("stray-file"), b"x").await.unwrap();

        let report = cache.scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.binaries.len(), 1);
        assert_eq!(report.binaries[0].git_ref, "ref-1");
        assert!(!report.binaries[0].is_valid);
        assert_eq!(report.skipped.len(), 4);
    }

    #[tokio::test]
    async fn test_scan_missing_network_is_empty() {
        let temp = tempdir().unwrap();
        let report = scan_cached_binaries(&CancellationToken::new(), temp.path(), "evm", "geth")
            .await
            .unwrap();
        assert!(report.binaries.is_empty());
    }

    #[tokio::test]
    async fn test_scan_all_networks() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache/binaries");
        store_script(&BinaryCache::new(&root, "cosmos", "simd"), temp.path(), 1, "true").await;
        store_script(&BinaryCache::new(&root, "wasm", "simd"), temp.path(), 2, "true").await;

        let report = scan_all_networks(&CancellationToken::new(), &root, "simd")
            .await
            .unwrap();
        let mut networks: Vec<_> = report
            .binaries
            .iter()
            .map(|b| b.network_type.clone())
            .collect();
        networks.sort();
        assert_eq!(networks, vec!["cosmos".to_string(), "wasm".to_string()]);
    }

    #[tokio::test]
    async fn test_validation_records_outcomes() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache/binaries");
        let cache = BinaryCache::new(&root, "cosmos", "simd");
        store_script(&cache, temp.path(), 1, "echo v0.50.10").await;
        store_script(&cache, temp.path(), 2, "echo 'panic: bad build' >&2; exit 2").await;
        store_script(&cache, temp.path(), 3, "sleep 30").await;

        let cancel = CancellationToken::new();
        let candidates = cache.scan(&cancel).await.unwrap().binaries;
        let results = validator()
            .with_timeout(Duration::from_secs(1))
            .validate_all(&cancel, candidates)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        let by_ref = |r: &str| results.iter().find(|b| b.git_ref == r).unwrap();

        let good = by_ref("ref-1");
        assert!(good.is_valid);
        assert_eq!(good.detected_version.as_deref(), Some("v0.50.10"));

        let crashed = by_ref("ref-2");
        assert!(!crashed.is_valid);
        assert!(crashed
            .validation_error
            .as_deref()
            .unwrap()
            .contains("panic: bad build"));

        let hung = by_ref("ref-3");
        assert!(!hung.is_valid);
        assert!(hung.validation_error.as_deref().unwrap().contains("timed out"));

        let summary = summarize_failures(&results);
        assert!(summary.contains("timed out"));
        assert!(!summary.contains(&good.commit_hash_short));
    }

    #[tokio::test]
    async fn test_validation_runs_concurrently() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache/binaries");
        let cache = BinaryCache::new(&root, "cosmos", "simd");
        for n in 1..=10 {
            store_script(&cache, temp.path(), n, "sleep 1; echo v1").await;
        }

        let cancel = CancellationToken::new();
        let candidates = cache.scan(&cancel).await.unwrap().binaries;
        let started = Instant::now();
        let results = validator()
            .with_timeout(Duration::from_secs(5))
            .validate_all(&cancel, candidates)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|b| b.is_valid));
        // Sequential execution would take at least 10s
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_results_sorted_most_recent_first() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache/binaries");
        let cache = BinaryCache::new(&root, "cosmos", "simd");
        store_script(&cache, temp.path(), 1, "echo old").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        store_script(&cache, temp.path(), 2, "echo new").await;

        let cancel = CancellationToken::new();
        let candidates = cache.scan(&cancel).await.unwrap().binaries;
        let results = validator().validate_all(&cancel, candidates).await.unwrap();
        assert_eq!(results[0].git_ref, "ref-2");
        assert_eq!(results[1].git_ref, "ref-1");
    }

    #[tokio::test]
    async fn test_cancelled_validation() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache/binaries");
        let cache = BinaryCache::new(&root, "cosmos", "simd");
        store_script(&cache, temp.path(), 1, "sleep 30").await;

        let cancel = CancellationToken::new();
        let candidates = cache.scan(&cancel).await.unwrap().binaries;
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = validator()
            .validate_all(&cancel, candidates)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}

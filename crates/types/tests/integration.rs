//! Integration tests for types

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use devnet_types::*;
    use std::path::PathBuf;
    use std::str::FromStr;

    const COMMIT: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2";

    fn sample_binary() -> CachedBinaryMetadata {
        let key = CacheKey::new(COMMIT, ConfigHash::parse("0badcafe").unwrap()).unwrap();
        let built = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        CachedBinaryMetadata::new(
            "cosmos",
            &key,
            "v0.50.10",
            built,
            1024,
            PathBuf::from("/tmp/cache/simd"),
            built,
        )
    }

    #[test]
    fn test_cache_key_from_str_and_serde() {
        let key = CacheKey::from_str(&format!("{COMMIT}-0badcafe")).unwrap();
        assert_eq!(key.commit_hash(), COMMIT);
        assert_eq!(key.config_hash().as_str(), "0badcafe");

        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{COMMIT}-0badcafe\""));
        let back: CacheKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        assert!(serde_json::from_str::<CacheKey>("\"not-a-key\"").is_err());
    }

    #[test]
    fn test_cached_binary_metadata_starts_unvalidated() {
        let binary = sample_binary();
        assert!(!binary.is_valid);
        assert!(binary.validation_error.is_none());
        assert_eq!(binary.commit_hash_short.len(), SHORT_COMMIT_LEN);
        assert_eq!(binary.cache_key().unwrap().commit_hash(), COMMIT);

        let value = serde_json::to_value(&binary).unwrap();
        assert_eq!(value["config_hash"], "0badcafe");
        assert!(value.get("validation_error").is_none());
        assert!(binary.display_label().starts_with("v0.50.10 (a1b2c3d4e5f6)"));
    }

    #[test]
    fn test_selection_result_helpers() {
        let selected = BinarySelectionResult::Selected {
            binary: Box::new(sample_binary()),
            auto_selected: true,
        };
        assert_eq!(selected.selected().map(|b| b.git_ref.as_str()), Some("v0.50.10"));
        assert!(!selected.should_build());

        let build = BinarySelectionResult::Build {
            version: "v0.51.0".to_string(),
        };
        assert!(build.should_build());
        assert!(build.selected().is_none());
        assert!(BinarySelectionResult::Cancelled.was_cancelled());
    }

    #[test]
    fn test_proposal_status_from_chain() {
        assert_eq!(
            ProposalStatus::from_chain("PROPOSAL_STATUS_PASSED"),
            ProposalStatus::Passed
        );
        assert_eq!(ProposalStatus::from_chain("2"), ProposalStatus::VotingPeriod);
        assert_eq!(ProposalStatus::from_chain("garbage"), ProposalStatus::Unknown);
        assert!(ProposalStatus::from_chain("PROPOSAL_STATUS_REJECTED").is_final_failure());
        assert!(!ProposalStatus::Passed.is_final_failure());
    }

    #[test]
    fn test_stage_side_effects() {
        assert!(!UpgradeStage::PlanPrinted.has_side_effects());
        assert!(UpgradeStage::ProposalSubmitted.has_side_effects());
        assert!(UpgradeStage::Failed.is_terminal());
        assert_eq!(
            serde_json::to_string(&UpgradeStage::AwaitingUpgradeHeight).unwrap(),
            "\"awaiting_upgrade_height\""
        );
    }

    #[test]
    fn test_execution_mode_parse() {
        assert_eq!(ExecutionMode::parse("Docker"), Some(ExecutionMode::Docker));
        assert_eq!(ExecutionMode::parse("local"), Some(ExecutionMode::Local));
        assert_eq!(ExecutionMode::parse("k8s"), None);
        assert_eq!(ExecutionMode::Local.to_string(), "local");
    }
}

//! Cache mutations: import, activate, clean and migrate

use crate::{CacheChange, ImportRequest, OpsCtx};
use devnet_errors::{CacheError, Error, UserFacingError};
use devnet_events::{AppEvent, CacheEvent, EventEmitter};
use devnet_store::{BuildIdentity, BuildInfo};
use devnet_types::{is_valid_commit_hash, CacheKey, ConfigHash};
use tokio_util::sync::CancellationToken;

/// Store an externally built binary in the cache
///
/// Importing the same commit and settings twice keeps the first entry.
///
/// # Errors
///
/// Returns an error if the path is not an executable file, the commit hash
/// is malformed, or the copy fails.
pub async fn cache_import(ctx: &OpsCtx, request: ImportRequest) -> Result<CacheChange, Error> {
    if !devnet_platform::fs::is_executable_file(&request.path).await {
        return Err(CacheError::MissingTarget {
            path: request.path.display().to_string(),
        }
        .into());
    }

    let commit_hash = request.commit_hash.to_ascii_lowercase();
    let config_hash = ConfigHash::from_build_settings(&request.build_settings);
    if !request.build_settings.is_empty() {
        ctx.emit_debug_with_context(
            format!("config hash {config_hash} from build settings"),
            request.build_settings.iter().cloned().collect(),
        );
    }
    let created = !ctx
        .cache
        .exists(&CacheKey::new(&commit_hash, config_hash.clone())?)
        .await;

    let info = BuildInfo {
        commit_hash,
        config_hash,
        git_ref: request.git_ref,
        build_time: chrono::Utc::now(),
    };
    let key = ctx.cache.store(&request.path, &info).await?;
    ctx.emit(AppEvent::Cache(CacheEvent::BinaryStored {
        cache_key: key.to_string(),
        path: ctx.cache.path(&key),
        created,
    }));

    let summary = if created {
        format!("Imported {} as {}", request.path.display(), key.commit_hash_short())
    } else {
        format!("{} is already cached", key.commit_hash_short())
    };
    Ok(CacheChange {
        operation: "import".to_string(),
        cache_keys: vec![key.to_string()],
        summary,
    })
}

/// Point the active binary at a cache entry
///
/// `reference` is a full cache key or a commit hash prefix of at least
/// seven characters.
///
/// # Errors
///
/// Returns an error if no entry matches or the switch fails; the previous
/// activation is kept in that case.
pub async fn cache_use(
    ctx: &OpsCtx,
    cancel: &CancellationToken,
    reference: &str,
) -> Result<CacheChange, Error> {
    let key = match CacheKey::parse(reference) {
        Ok(key) => {
            if !ctx.cache.exists(&key).await {
                return Err(CacheError::EntryNotFound {
                    key: key.to_string(),
                }
                .into());
            }
            ctx.activation.switch_to_key(&ctx.cache, &key).await?;
            key
        }
        Err(_) => {
            ctx.activation
                .switch_to_cache(cancel, &ctx.cache, reference)
                .await?
        }
    };

    Ok(CacheChange {
        operation: "use".to_string(),
        summary: format!(
            "{} now points at {}",
            ctx.activation.pointer_path().display(),
            key.commit_hash_short()
        ),
        cache_keys: vec![key.to_string()],
    })
}

/// Remove every cache entry except those of the active commit
///
/// # Errors
///
/// Returns an error if the cache or the active pointer cannot be read.
pub async fn cache_clean(ctx: &OpsCtx) -> Result<CacheChange, Error> {
    ctx.emit_operation_started("cache clean");
    let active_commit = ctx
        .activation
        .current()
        .await?
        .and_then(|active| active.commit_hash);

    let keep: Vec<CacheKey> = match &active_commit {
        Some(commit) => ctx
            .cache
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| key.commit_hash() == commit)
            .collect(),
        None => Vec::new(),
    };

    let removed = ctx.cache.clean(&keep).await?;
    for key in &removed {
        ctx.emit(AppEvent::Cache(CacheEvent::EntryRemoved {
            cache_key: key.to_string(),
        }));
    }
    ctx.emit_operation_completed("cache clean", true);

    Ok(CacheChange {
        operation: "clean".to_string(),
        summary: format!(
            "Removed {} cache entr{}, kept {}",
            removed.len(),
            if removed.len() == 1 { "y" } else { "ies" },
            keep.len()
        ),
        cache_keys: removed.iter().map(ToString::to_string).collect(),
    })
}

/// Move a plain binary at the pointer location into the cache
///
/// Without an explicit commit the binary is asked for it through
/// `version --long`.
///
/// # Errors
///
/// Returns an error if the commit cannot be determined or storing fails.
pub async fn migrate(
    ctx: &OpsCtx,
    commit_hash: Option<String>,
    git_ref: Option<String>,
) -> Result<CacheChange, Error> {
    if !ctx.activation.has_plain_binary().await {
        return Ok(CacheChange {
            operation: "migrate".to_string(),
            cache_keys: Vec::new(),
            summary: "Nothing to migrate".to_string(),
        });
    }

    ctx.emit_operation_started("migrate");
    let pointer = ctx.activation.pointer_path();
    let detected = match commit_hash {
        Some(_) => BuildIdentity::default(),
        None => detect_build(ctx, &pointer).await,
    };
    let commit_hash = commit_hash
        .or(detected.commit)
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| is_valid_commit_hash(c))
        .ok_or_else(|| CacheError::InvalidCommitHash {
            value: format!("{} (pass --commit)", pointer.display()),
        })?;

    let info = BuildInfo {
        commit_hash,
        config_hash: ConfigHash::from_build_settings::<&str, &str>(&[]),
        git_ref: git_ref
            .or(detected.version)
            .unwrap_or_else(|| "unknown".to_string()),
        build_time: chrono::Utc::now(),
    };

    let migrated = ctx.activation.migrate_to_symlink(&ctx.cache, &info).await?;
    ctx.emit_operation_completed("migrate", migrated.is_some());
    match migrated {
        Some(key) => Ok(CacheChange {
            operation: "migrate".to_string(),
            summary: format!("Migrated {} into the cache", pointer.display()),
            cache_keys: vec![key.to_string()],
        }),
        None => Ok(CacheChange {
            operation: "migrate".to_string(),
            cache_keys: Vec::new(),
            summary: "Nothing to migrate".to_string(),
        }),
    }
}

/// Commit and version reported by `binary version --long`
async fn detect_build(ctx: &OpsCtx, binary: &std::path::Path) -> BuildIdentity {
    match ctx.validator().identify(binary).await {
        Ok(identity) => {
            ctx.emit_debug(format!(
                "detected commit {:?} version {:?}",
                identity.commit, identity.version
            ));
            identity
        }
        Err(e) => {
            ctx.emit_warning_with_context(
                "Could not run `version --long` to detect the commit",
                e.user_message().into_owned(),
            );
            BuildIdentity::default()
        }
    }
}

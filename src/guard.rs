//! Ownership and Access Guard
//!
//! Resolves a resource's owning user through the version -> project -> user
//! chain and compares it against the caller. `NotFound` when the resource id
//! resolves to no record, `Forbidden` when it resolves to a different owner.
//! A caller never learns more about another user's resource than a generic
//! Forbidden. All checks are side-effect free.

use crate::error::EvalError;
use crate::storage::EvaluationStore;
use crate::types::{JobKind, JobRecord, ProjectMeta, VersionMeta};

fn storage_err(e: crate::storage::StorageError) -> EvalError {
    EvalError::Storage(e.to_string())
}

/// Resolve a version's owning project, without an access check.
pub async fn resolve_version(
    store: &dyn EvaluationStore,
    version_id: &str,
) -> Result<(VersionMeta, ProjectMeta), EvalError> {
    let version = store
        .get_version(version_id)
        .await
        .map_err(storage_err)?
        .ok_or(EvalError::NotFound("version"))?;

    // Versions are immutable and never outlive their project; a missing
    // project here is a store inconsistency, not a caller error.
    let project = store
        .get_project(&version.project_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| {
            EvalError::Storage(format!(
                "version {} references missing project {}",
                version.id, version.project_id
            ))
        })?;

    Ok((version, project))
}

/// Check that `caller` owns the given version.
pub async fn check_version_access(
    store: &dyn EvaluationStore,
    caller: &str,
    version_id: &str,
) -> Result<(VersionMeta, ProjectMeta), EvalError> {
    let (version, project) = resolve_version(store, version_id).await?;
    if project.user_id != caller {
        return Err(EvalError::Forbidden);
    }
    Ok((version, project))
}

/// Check that `caller` owns the given project.
pub async fn check_project_access(
    store: &dyn EvaluationStore,
    caller: &str,
    project_id: &str,
) -> Result<ProjectMeta, EvalError> {
    let project = store
        .get_project(project_id)
        .await
        .map_err(storage_err)?
        .ok_or(EvalError::NotFound("project"))?;
    if project.user_id != caller {
        return Err(EvalError::Forbidden);
    }
    Ok(project)
}

/// Check that `caller` owns the given evaluation job, via its version chain.
pub async fn check_job_access(
    store: &dyn EvaluationStore,
    caller: &str,
    kind: JobKind,
    job_id: &str,
) -> Result<JobRecord, EvalError> {
    let job = store
        .get_job(kind, job_id)
        .await
        .map_err(storage_err)?
        .ok_or(EvalError::NotFound("job"))?;

    check_version_access(store, caller, &job.version_id).await?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use crate::types::NewJob;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_project("proj-1", "user-1", "checkout flow");
        store.insert_version("ver-1", "proj-1", "v3");
        store.insert_project("proj-2", "user-2", "billing flow");
        store.insert_version("ver-2", "proj-2", "v1");
        store
    }

    #[tokio::test]
    async fn test_owner_passes() {
        let store = seeded();
        let (version, project) = check_version_access(&store, "user-1", "ver-1")
            .await
            .unwrap();
        assert_eq!(version.project_id, "proj-1");
        assert_eq!(project.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_wrong_owner_is_forbidden() {
        let store = seeded();
        let err = check_version_access(&store, "user-1", "ver-2").await;
        assert!(matches!(err, Err(EvalError::Forbidden)));

        let err = check_project_access(&store, "user-2", "proj-1").await;
        assert!(matches!(err, Err(EvalError::Forbidden)));
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let store = seeded();
        let err = check_version_access(&store, "user-1", "ver-404").await;
        assert!(matches!(err, Err(EvalError::NotFound("version"))));

        let err = check_project_access(&store, "user-1", "proj-404").await;
        assert!(matches!(err, Err(EvalError::NotFound("project"))));
    }

    #[tokio::test]
    async fn test_job_access_follows_version_chain() {
        let store = seeded();
        let new = NewJob::create("ver-1", JobKind::Grade);
        crate::storage::EvaluationStore::create_job(&store, &new)
            .await
            .unwrap();

        let job = check_job_access(&store, "user-1", JobKind::Grade, &new.id)
            .await
            .unwrap();
        assert_eq!(job.version_id, "ver-1");

        let err = check_job_access(&store, "user-2", JobKind::Grade, &new.id).await;
        assert!(matches!(err, Err(EvalError::Forbidden)));

        let err = check_job_access(&store, "user-1", JobKind::Grade, "job-404").await;
        assert!(matches!(err, Err(EvalError::NotFound("job"))));
    }
}

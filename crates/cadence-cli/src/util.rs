use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::repository::TaskStore;
use thiserror::Error;
use uuid::Uuid;

const MIN_PREFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Short ID must be at least 4 characters long.")]
    TooShort,
    #[error("Ambiguous ID '{prefix}'")]
    Ambiguous {
        prefix: String,
        candidates: Vec<(Uuid, String)>,
    },
}

/// Accepts a full UUID or a unique prefix of one.
pub async fn resolve_task_id(repo: &(impl TaskStore + Sync), short_id: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(short_id) {
        return Ok(id);
    }
    if short_id.len() < MIN_PREFIX_LEN {
        return Err(anyhow!(LookupError::TooShort));
    }

    let mut tasks = repo.find_tasks_by_short_id_prefix(short_id).await?;
    match tasks.len() {
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        )))),
        1 => Ok(tasks.remove(0).id),
        _ => Err(anyhow!(LookupError::Ambiguous {
            prefix: short_id.to_string(),
            candidates: tasks.into_iter().map(|t| (t.id, t.title)).collect(),
        })),
    }
}

/// Uniform "Some(None)" clearing for optional edit flags.
pub fn clearable<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// `None` for an empty list, so the update stays a no-op for that field.
pub fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

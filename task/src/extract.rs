use thiserror::Error;

use tessera_api::TaskRecord;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("task reported no affected entities")]
    NoEntities,

    #[error("task affected {count} entities; select one by rel tag or index")]
    Ambiguous { count: usize },

    #[error("no affected entity with rel tag {rel:?}")]
    RelNotFound { rel: String },

    #[error("affected-entity index {index} out of range (task reported {count})")]
    IndexOutOfRange { index: usize, count: usize },
}

/// How to pick the entity the caller cares about from a task's
/// affected-entity list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EntitySelector {
    /// The task is expected to have affected exactly one entity.
    #[default]
    Only,
    /// Select by the role the entity played, e.g. a clone task reports both
    /// the source and the destination and only `rel` tells them apart.
    Rel(String),
    /// Positional fallback for endpoints that report no rel metadata.
    Index(usize),
}

impl EntitySelector {
    pub fn rel(rel: impl Into<String>) -> Self {
        EntitySelector::Rel(rel.into())
    }
}

/// Select the affected entity a caller wants from a completed task.
///
/// Selection is always checked: a multi-entity task with no selector is an
/// error, and a rel tag that matches nothing is an error, never a silent
/// first-element fallback.
pub fn extract_affected(
    record: &TaskRecord,
    selector: &EntitySelector,
) -> Result<String, ExtractError> {
    let entities = &record.entities_affected;
    if entities.is_empty() {
        return Err(ExtractError::NoEntities);
    }

    match selector {
        EntitySelector::Only => {
            if entities.len() > 1 {
                return Err(ExtractError::Ambiguous {
                    count: entities.len(),
                });
            }
            Ok(entities[0].ext_id.clone())
        }
        EntitySelector::Rel(rel) => entities
            .iter()
            .find(|entity| entity.rel.as_deref() == Some(rel))
            .map(|entity| entity.ext_id.clone())
            .ok_or_else(|| ExtractError::RelNotFound { rel: rel.clone() }),
        EntitySelector::Index(index) => entities
            .get(*index)
            .map(|entity| entity.ext_id.clone())
            .ok_or(ExtractError::IndexOutOfRange {
                index: *index,
                count: entities.len(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json};

    fn clone_task() -> TaskRecord {
        from_value(json!({
            "extId": "t-1",
            "status": "SUCCEEDED",
            "entitiesAffected": [
                { "extId": "a", "rel": "source" },
                { "extId": "b", "rel": "destination" }
            ]
        }))
        .unwrap()
    }

    fn single_entity_task() -> TaskRecord {
        from_value(json!({
            "extId": "t-2",
            "status": "SUCCEEDED",
            "entitiesAffected": [{ "extId": "vm-123" }]
        }))
        .unwrap()
    }

    #[test]
    fn single_entity_needs_no_selector() {
        assert_eq!(
            extract_affected(&single_entity_task(), &EntitySelector::Only).unwrap(),
            "vm-123"
        );
    }

    #[test]
    fn selects_by_rel_tag() {
        let record = clone_task();
        assert_eq!(
            extract_affected(&record, &EntitySelector::rel("destination")).unwrap(),
            "b"
        );
        assert_eq!(
            extract_affected(&record, &EntitySelector::rel("source")).unwrap(),
            "a"
        );
    }

    #[test]
    fn missing_rel_tag_is_an_error_not_a_guess() {
        let record = clone_task();
        assert_eq!(
            extract_affected(&record, &EntitySelector::rel("missing-tag")),
            Err(ExtractError::RelNotFound {
                rel: "missing-tag".to_owned()
            })
        );
    }

    #[test]
    fn multiple_entities_without_selector_is_ambiguous() {
        assert_eq!(
            extract_affected(&clone_task(), &EntitySelector::Only),
            Err(ExtractError::Ambiguous { count: 2 })
        );
    }

    #[test]
    fn index_fallback_is_bounds_checked() {
        let record = clone_task();
        assert_eq!(
            extract_affected(&record, &EntitySelector::Index(1)).unwrap(),
            "b"
        );
        assert_eq!(
            extract_affected(&record, &EntitySelector::Index(2)),
            Err(ExtractError::IndexOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn empty_entity_list_is_an_error() {
        let record: TaskRecord =
            from_value(json!({ "extId": "t-3", "status": "SUCCEEDED" })).unwrap();
        assert_eq!(
            extract_affected(&record, &EntitySelector::Only),
            Err(ExtractError::NoEntities)
        );
    }
}

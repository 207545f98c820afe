//! Record CRUD commands.

use super::{instant_arg, print_json, CliError, CliResult, EditArgs, Session};
use serde_json::json;
use workid_core::{CoreError, RecordDraft, RecordPatch};

/// Prints a fresh unused id.
pub fn new_id(session: &Session) -> CliResult {
    let id = session.store.new_id()?;
    print_json(&json!({ "id": id }))
}

/// Creates a record owned by `actor`.
pub fn create(
    session: &Session,
    actor: Option<&str>,
    title: Option<String>,
    id: Option<String>,
    private: bool,
    edit: &EditArgs,
) -> CliResult {
    let actor = actor.ok_or(CliError::Usage("create needs --as <creator>"))?;
    let mut draft = match &edit.json {
        Some(body) => RecordDraft::from_json(&serde_json::from_str(body)?)?,
        None => RecordDraft::default(),
    };
    draft.creator_id = actor.to_string();
    if let Some(title) = title {
        draft.title = title;
    }
    if id.is_some() {
        draft.id = id;
    }
    if private {
        draft.public = Some(false);
    }
    if let Some(description) = &edit.description {
        draft.description = Some(description.clone());
    }
    if let Some(active) = edit.active {
        draft.active = Some(active);
    }
    if let Some(start) = instant_arg(edit.start.as_deref())? {
        draft.time_start = start;
    }
    if let Some(end) = instant_arg(edit.end.as_deref())? {
        draft.time_end = end;
    }
    draft.meta.extend(session.meta_from_args(&edit.meta)?);

    let record = session.store.create(draft)?;
    print_json(&record)
}

/// Prints one record.
pub fn get(session: &Session, id: &str) -> CliResult {
    match session.store.get(id)? {
        Some(record) => print_json(&record),
        None => Err(CoreError::not_found(id).into()),
    }
}

/// Builds a patch from `update` arguments.
pub fn patch_from_args(
    session: &Session,
    title: Option<String>,
    clear_description: bool,
    public: Option<bool>,
    expect_version: Option<u64>,
    edit: &EditArgs,
) -> CliResult<RecordPatch> {
    let mut patch = match &edit.json {
        Some(body) => RecordPatch::from_json(&serde_json::from_str(body)?)?,
        None => RecordPatch::new(),
    };
    if let Some(title) = title {
        patch.title = Some(title);
    }
    if clear_description {
        patch.description = Some(None);
    } else if let Some(description) = &edit.description {
        patch.description = Some(Some(description.clone()));
    }
    if public.is_some() {
        patch.public = public;
    }
    if edit.active.is_some() {
        patch.active = edit.active;
    }
    if let Some(start) = instant_arg(edit.start.as_deref())? {
        patch.time_start = Some(start);
    }
    if let Some(end) = instant_arg(edit.end.as_deref())? {
        patch.time_end = Some(end);
    }
    if expect_version.is_some() {
        patch.expected_version = expect_version;
    }
    patch.meta.extend(session.meta_from_args(&edit.meta)?);
    Ok(patch)
}

/// Applies `patch` on behalf of `actor`.
pub fn update(session: &Session, actor: Option<&str>, id: &str, patch: &RecordPatch) -> CliResult {
    let actor = actor.ok_or(CliError::Usage("update needs --as <creator>"))?;
    if patch.is_empty() {
        tracing::warn!(id, "empty update, only changed_at and version move");
    }
    let record = session.store.update(id, patch, actor)?;
    print_json(&record)
}

/// Deletes a record.
pub fn delete(session: &Session, actor: Option<&str>, id: &str) -> CliResult {
    let deleted = session.store.delete(id, actor)?;
    if !deleted {
        return Err(CoreError::not_found(id).into());
    }
    print_json(&json!({ "id": id, "deleted": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Session;
    use workid_core::MetaValue;

    #[test]
    fn update_flags_build_a_patch() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(dir.path()).unwrap();
        let edit = EditArgs {
            start: Some(String::new()),
            meta: vec!["color=red".to_string()],
            ..EditArgs::default()
        };

        let patch =
            patch_from_args(&session, Some("t".to_string()), true, Some(false), Some(2), &edit)
                .unwrap();

        assert_eq!(patch.title.as_deref(), Some("t"));
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.public, Some(false));
        assert_eq!(patch.time_start, Some(None));
        assert_eq!(patch.expected_version, Some(2));
        assert_eq!(patch.meta["color"], MetaValue::scalar("red"));
    }

    #[test]
    fn json_body_is_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(dir.path()).unwrap();
        let edit = EditArgs {
            json: Some(r#"{"title":"from json","creator_id":"ignored"}"#.to_string()),
            ..EditArgs::default()
        };
        let patch = patch_from_args(&session, None, false, None, None, &edit).unwrap();
        assert_eq!(patch.title.as_deref(), Some("from json"));
    }
}

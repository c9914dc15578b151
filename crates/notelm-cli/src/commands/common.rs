use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use notelm_core::models::SyncConflict;
use notelm_core::remote::{FsRemote, UserId};
use notelm_core::{Note, NoteId, NoteService};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub updated_at: i64,
    pub relative_time: String,
    pub tags: Vec<String>,
    pub current: bool,
}

/// Where `notelm sync` sends and reads notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub remote_dir: PathBuf,
    pub user_id: UserId,
    pub poll_interval: Option<Duration>,
}

impl SyncTarget {
    pub fn remote(&self) -> FsRemote {
        let remote = FsRemote::new(&self.remote_dir);
        match self.poll_interval {
            Some(interval) => remote.with_poll_interval(interval),
            None => remote,
        }
    }
}

pub async fn list_notes(
    limit: usize,
    tag: Option<&str>,
    db_path: &Path,
) -> Result<Vec<Note>, CliError> {
    let notes = open_notes(db_path)?;
    let mut listed = if let Some(tag_name) = tag {
        notes.list_notes_by_tag(tag_name).await
    } else {
        notes.list_notes().await
    };
    listed.truncate(limit);
    Ok(listed)
}

pub async fn list_all_notes(db_path: &Path) -> Result<Vec<Note>, CliError> {
    let notes = open_notes(db_path)?;
    Ok(notes.list_notes().await)
}

pub async fn search_notes(
    query: &str,
    limit: usize,
    db_path: &Path,
) -> Result<Vec<Note>, CliError> {
    let notes = open_notes(db_path)?;
    let mut found = notes.search_notes(query).await;
    found.truncate(limit);
    Ok(found)
}

pub async fn resolve_note(note_query: &str, notes: &NoteService) -> Result<Note, CliError> {
    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(note) = notes.get_note(&note_id).await {
            return Ok(note);
        }
    }

    let query = note_query.to_ascii_lowercase();
    let mut matching = notes
        .list_notes()
        .await
        .into_iter()
        .filter(|note| note.id.to_string().starts_with(&query))
        .collect::<Vec<Note>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(note_query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| note.id.to_string().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn format_note_lines(notes: &[Note], current: Option<NoteId>) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let marker = if Some(note.id) == current { '*' } else { ' ' };
            let id = note.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            let tags = render_tags(note);

            if tags.is_empty() {
                format!("{marker} {short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{marker} {short_id:<13}  {preview:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note, current: Option<NoteId>) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();

    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
        tags: note.tags.iter().cloned().collect(),
        current: Some(note.id) == current,
    }
}

/// Title followed by the first content line, collapsed to one line.
pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.content.lines().next().unwrap_or("").trim();
    let text = if note.is_untitled() {
        first_line.to_string()
    } else if first_line.is_empty() {
        note.title.trim().to_string()
    } else {
        format!("{}: {first_line}", note.title.trim())
    };
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<11}  note={}  local={} incoming={}",
                format_timestamp(conflict.resolved_at),
                conflict.outcome,
                conflict.note_id,
                conflict.local_updated_at,
                conflict.incoming_updated_at
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // Editor commands with args, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("notelm-note-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("NOTELM_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notelm")
        .join("notelm.db")
}

pub fn open_notes(path: &Path) -> Result<NoteService, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(NoteService::open_path(path)?)
}

/// Resolve the sync target from `NOTELM_REMOTE_DIR`/`NOTELM_USER_ID`, then
/// from the selected profile.
pub fn resolve_sync_target(profile: Option<&str>) -> Result<Option<SyncTarget>, CliError> {
    let env_dir = normalize_text_option(env::var("NOTELM_REMOTE_DIR").ok());
    let env_user = normalize_text_option(env::var("NOTELM_USER_ID").ok());
    if env_dir.is_some() || env_user.is_some() {
        tracing::debug!("Using sync target from environment");
        return sync_target_from_parts(env_dir.map(PathBuf::from), env_user, None);
    }

    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let Some(profile) = config.profile(&profile_name) else {
        return Ok(None);
    };
    tracing::debug!("Using sync target from profile '{}'", profile_name);
    sync_target_from_parts(
        profile.remote_dir(),
        profile.user_id(),
        profile.poll_interval(),
    )
}

pub fn sync_target_from_parts(
    remote_dir: Option<PathBuf>,
    user_id: Option<String>,
    poll_interval: Option<Duration>,
) -> Result<Option<SyncTarget>, CliError> {
    match (remote_dir, user_id) {
        (Some(remote_dir), Some(user_id)) => Ok(Some(SyncTarget {
            remote_dir,
            user_id: UserId::new(user_id)?,
            poll_interval,
        })),
        (None, None) => Ok(None),
        (None, Some(_)) => Err(CliError::Config("remote_dir is not set".to_string())),
        (Some(_), None) => Err(CliError::Config("user_id is not set".to_string())),
    }
}

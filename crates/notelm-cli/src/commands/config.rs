use std::env;
use std::path::PathBuf;

use notelm_core::remote::UserId;

use crate::cli::ConfigCommands;
use crate::config_profiles::{default_config_path, normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

/// Values passed to `notelm config init`.
#[derive(Debug, Default)]
pub struct ProfileInit {
    pub remote_dir: Option<PathBuf>,
    pub user_id: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub no_activate: bool,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            remote_dir,
            user_id,
            poll_interval_ms,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileInit {
                remote_dir,
                user_id,
                poll_interval_ms,
                no_activate,
            },
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(profile_name: Option<&str>, init: ProfileInit) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = apply_profile_init(&mut config, profile_name, init)?;

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let missing_fields = config
        .profile(&profile_name)
        .map(|profile| profile.missing_sync_fields())
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    if missing_fields.is_empty() {
        println!("Sync profile '{profile_name}' is ready. Run `notelm sync`.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Merge explicit values, then environment, then existing profile values.
///
/// Returns the resolved profile name.
pub fn apply_profile_init(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    init: ProfileInit,
) -> Result<String, CliError> {
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let remote_dir = init
        .remote_dir
        .map(|dir| dir.to_string_lossy().into_owned())
        .and_then(|dir| normalize_text_option(Some(dir)))
        .or_else(|| normalize_text_option(env::var("NOTELM_REMOTE_DIR").ok()))
        .or(existing.remote_dir);
    let user_id = normalize_text_option(init.user_id)
        .or_else(|| normalize_text_option(env::var("NOTELM_USER_ID").ok()))
        .or(existing.user_id);
    if let Some(user_id) = &user_id {
        UserId::new(user_id.as_str())?;
    }

    let profile = config.profile_mut_or_default(&profile_name);
    profile.remote_dir = remote_dir;
    profile.user_id = user_id;
    if let Some(millis) = init.poll_interval_ms {
        profile.poll_interval_ms = Some(millis).filter(|millis| *millis > 0);
    }

    if !init.no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    println!("config:  {}", default_config_path().display());
    println!("profile: {profile_name}");
    match config.profile(&profile_name) {
        Some(profile) => println!("{}", serde_json::to_string_pretty(profile)?),
        None => println!("(not configured)"),
    }
    Ok(())
}

use anyhow::{Context, Result, bail, ensure};
use chrono::{Duration, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::lock::DEFAULT_LOCK_TIMEOUT;
use crate::store::DEFAULT_MAX_EVENTS_PER_DAY;

/// Fully validated configuration, as loaded by [`DutyCalConfig::load`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DutyCalConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub calendar: CalendarSettings,
    #[serde(default)]
    pub recurrence: RecurrenceSettings,
    #[serde(default)]
    pub recurring_events: Vec<RecurrenceRule>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Database file; defaults under the user data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_column_family")]
    pub column_family: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            keyspace: default_keyspace(),
            column_family: default_column_family(),
        }
    }
}

impl StoreSettings {
    /// Configured database path, or `<data dir>/dutycal/events.sqlite3`.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("dutycal")
                .join("events.sqlite3")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSettings {
    #[serde(default = "default_time_zone")]
    pub time_zone: Tz,
    #[serde(default = "default_max_events_per_day")]
    pub max_events_per_day: u32,
    /// Rows shown in the "open shifts" list.
    #[serde(default = "default_upcoming_limit")]
    pub upcoming_events_limit: u32,
    /// Rows shown in a user's own list.
    #[serde(default = "default_user_limit")]
    pub user_events_limit: u32,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            max_events_per_day: default_max_events_per_day(),
            upcoming_events_limit: default_upcoming_limit(),
            user_events_limit: default_user_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceSettings {
    /// Days ahead of today the generator materializes.
    #[serde(default = "default_schedule_ahead")]
    pub schedule_ahead_days: u32,
    /// Scheduler lock file; defaults next to the database.
    #[serde(default)]
    pub lock_path: Option<PathBuf>,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for RecurrenceSettings {
    fn default() -> Self {
        Self {
            schedule_ahead_days: default_schedule_ahead(),
            lock_path: None,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl RecurrenceSettings {
    #[must_use]
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }
}

/// How occurrences of a rule are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    /// Once a week on a fixed weekday.
    #[default]
    Weekday,
}

/// One recurring shift definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(default)]
    pub kind: RecurrenceKind,
    pub weekday: Weekday,
    pub start_hour: u32,
    #[serde(default)]
    pub start_minute: u32,
    #[serde(default)]
    pub duration_hours: u32,
    #[serde(default)]
    pub duration_minutes: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub reference: Option<String>,
    /// Overrides [`RecurrenceSettings::schedule_ahead_days`] for this rule.
    #[serde(default)]
    pub schedule_ahead_days: Option<u32>,
}

impl RecurrenceRule {
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::hours(i64::from(self.duration_hours))
            + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Parsed reference; validated at load, so only `None` when unset.
    #[must_use]
    pub fn reference_url(&self) -> Option<Url> {
        self.reference.as_deref().and_then(|raw| Url::parse(raw).ok())
    }

    fn validate(&self, index: usize) -> Result<()> {
        let at = || format!("recurring_events[{index}] ({:?})", self.title);
        ensure!(!self.title.trim().is_empty(), "{}: title is empty", at());
        ensure!(!self.description.trim().is_empty(), "{}: description is empty", at());
        ensure!(self.start_hour < 24, "{}: start_hour {} out of range", at(), self.start_hour);
        ensure!(
            self.start_minute < 60,
            "{}: start_minute {} out of range",
            at(),
            self.start_minute
        );
        ensure!(
            self.duration_minutes < 60,
            "{}: duration_minutes {} out of range",
            at(),
            self.duration_minutes
        );
        if let Some(raw) = &self.reference {
            Url::parse(raw).with_context(|| format!("{}: invalid reference {raw:?}", at()))?;
        }
        Ok(())
    }
}

/// Alert recipient group and how far ahead it is warned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    #[serde(default = "default_warning_lookahead")]
    pub warning_lookahead_days: u32,
}

impl DutyCalConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, resolving relative store and lock paths against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.store.path = config.store.path.map(|p| base.join(p));
            config.recurrence.lock_path = config.recurrence.lock_path.map(|p| base.join(p));
        }
        tracing::debug!(path = %path.display(), rules = config.recurring_events.len(), "config loaded");
        Ok(config)
    }

    /// Load an explicit path, else the user config file if present, else
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but is invalid, or an
    /// explicit path is missing.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check cross-field constraints the TOML types cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.calendar.max_events_per_day > 0,
            "calendar.max_events_per_day must be positive"
        );
        ensure!(
            self.calendar.upcoming_events_limit > 0 && self.calendar.user_events_limit > 0,
            "calendar event list limits must be positive"
        );
        ensure!(!self.store.keyspace.is_empty(), "store.keyspace is empty");
        ensure!(!self.store.column_family.is_empty(), "store.column_family is empty");
        for (index, rule) in self.recurring_events.iter().enumerate() {
            rule.validate(index)?;
        }
        let mut names = std::collections::HashSet::new();
        for notification in &self.notifications {
            if !names.insert(notification.name.as_str()) {
                bail!("duplicate notification {:?}", notification.name);
            }
        }
        Ok(())
    }

    /// Scheduler lock file: configured, or `dutygen.lock` beside the database.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.recurrence
            .lock_path
            .clone()
            .unwrap_or_else(|| self.store.resolved_path().with_file_name("dutygen.lock"))
    }

    /// Horizon for `rule`, honouring its override.
    #[must_use]
    pub fn schedule_ahead_days(&self, rule: &RecurrenceRule) -> u32 {
        rule.schedule_ahead_days
            .unwrap_or(self.recurrence.schedule_ahead_days)
    }
}

/// `<config dir>/dutycal/config.toml`, if the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dutycal").join("config.toml"))
}

fn default_keyspace() -> String {
    "dutycal".to_string()
}

fn default_column_family() -> String {
    "events".to_string()
}

const fn default_time_zone() -> Tz {
    Tz::UTC
}

const fn default_max_events_per_day() -> u32 {
    DEFAULT_MAX_EVENTS_PER_DAY
}

const fn default_upcoming_limit() -> u32 {
    10
}

const fn default_user_limit() -> u32 {
    10
}

const fn default_schedule_ahead() -> u32 {
    14
}

const fn default_warning_lookahead() -> u32 {
    3
}

fn default_lock_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_LOCK_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[store]
path = "data/events.sqlite3"
keyspace = "roster"

[calendar]
time_zone = "Europe/Zurich"
max_events_per_day = 6

[recurrence]
schedule_ahead_days = 21

[[recurring_events]]
kind = "weekday"
weekday = "Mon"
start_hour = 9
duration_minutes = 30
title = "Standup"
description = "daily sync"
required = true
reference = "https://wiki.example.org/standup"

[[recurring_events]]
weekday = "Friday"
start_hour = 18
start_minute = 30
duration_hours = 3
title = "Open lab"
description = "keys at the front desk"
schedule_ahead_days = 7

[[notifications]]
name = "hosts"
"#;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = DutyCalConfig::from_toml_str("").expect("defaults");
        assert_eq!(cfg.store.keyspace, "dutycal");
        assert_eq!(cfg.store.column_family, "events");
        assert_eq!(cfg.calendar.time_zone, Tz::UTC);
        assert_eq!(cfg.calendar.max_events_per_day, DEFAULT_MAX_EVENTS_PER_DAY);
        assert_eq!(cfg.recurrence.schedule_ahead_days, 14);
        assert_eq!(cfg.recurrence.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
        assert!(cfg.recurring_events.is_empty());
    }

    #[test]
    fn sample_parses_rules_and_overrides() {
        let cfg = DutyCalConfig::from_toml_str(SAMPLE).expect("sample config");
        assert_eq!(cfg.calendar.time_zone, chrono_tz::Europe::Zurich);
        assert_eq!(cfg.store.keyspace, "roster");
        assert_eq!(cfg.store.column_family, "events");

        let standup = &cfg.recurring_events[0];
        assert_eq!(standup.weekday, Weekday::Mon);
        assert_eq!(standup.duration(), Duration::minutes(30));
        assert!(standup.reference_url().is_some());
        assert_eq!(cfg.schedule_ahead_days(standup), 21);

        let lab = &cfg.recurring_events[1];
        assert_eq!(lab.kind, RecurrenceKind::Weekday);
        assert_eq!(lab.weekday, Weekday::Fri);
        assert!(!lab.required);
        assert_eq!(lab.duration(), Duration::hours(3));
        assert_eq!(cfg.schedule_ahead_days(lab), 7);

        assert_eq!(cfg.notifications[0].warning_lookahead_days, 3);
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let err = DutyCalConfig::from_toml_str("[calendar]\ntime_zone = \"Mars/Olympus\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn unknown_recurrence_kind_is_rejected() {
        let doc = SAMPLE.replace("kind = \"weekday\"", "kind = \"monthly\"");
        assert!(DutyCalConfig::from_toml_str(&doc).is_err());
    }

    #[test]
    fn invalid_rule_fields_are_rejected() {
        for (from, to) in [
            ("start_hour = 9", "start_hour = 24"),
            ("duration_minutes = 30", "duration_minutes = 75"),
            ("title = \"Standup\"", "title = \"  \""),
            (
                "reference = \"https://wiki.example.org/standup\"",
                "reference = \"wiki/standup\"",
            ),
        ] {
            let doc = SAMPLE.replace(from, to);
            let err = DutyCalConfig::from_toml_str(&doc).expect_err(to);
            assert!(
                format!("{err:#}").contains("recurring_events[0]"),
                "unexpected error for {to}: {err:#}"
            );
        }
    }

    #[test]
    fn zero_event_density_is_rejected() {
        let err = DutyCalConfig::from_toml_str("[calendar]\nmax_events_per_day = 0\n")
            .expect_err("zero density");
        assert!(err.to_string().contains("max_events_per_day"));
    }

    #[test]
    fn duplicate_notifications_are_rejected() {
        let doc = format!("{SAMPLE}\n[[notifications]]\nname = \"hosts\"\n");
        assert!(DutyCalConfig::from_toml_str(&doc).is_err());
    }

    #[test]
    fn load_resolves_paths_against_config_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dutycal.toml");
        std::fs::write(&path, SAMPLE).expect("write config");

        let cfg = DutyCalConfig::load(&path).expect("load");
        let db = dir.path().join("data/events.sqlite3");
        assert_eq!(cfg.store.resolved_path(), db);
        assert_eq!(cfg.lock_path(), dir.path().join("data/dutygen.lock"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = DutyCalConfig::load_or_default(Some(&dir.path().join("absent.toml")))
            .expect_err("missing file");
        assert!(err.to_string().starts_with("Failed to read"));
    }
}

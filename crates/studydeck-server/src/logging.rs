//! Tracing setup.
//!
//! Levels are resolved per studydeck target. A verbosity preset gives every
//! target a level, the `[logging]` section of the config file can override
//! single targets, and `--log target=level` flags override both. When
//! `RUST_LOG` is set it replaces all of this.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log targets the server emits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogTarget {
    Startup,
    Api,
    Auth,
    Tools,
    Sync,
    Store,
    Ai,
    /// Request spans from tower-http.
    Http,
}

impl LogTarget {
    pub const ALL: [LogTarget; 8] = [
        LogTarget::Startup,
        LogTarget::Api,
        LogTarget::Auth,
        LogTarget::Tools,
        LogTarget::Sync,
        LogTarget::Store,
        LogTarget::Ai,
        LogTarget::Http,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogTarget::Startup => "studydeck::startup",
            LogTarget::Api => "studydeck::api",
            LogTarget::Auth => "studydeck::auth",
            LogTarget::Tools => "studydeck::tools",
            LogTarget::Sync => "studydeck::sync",
            LogTarget::Store => "studydeck::store",
            LogTarget::Ai => "studydeck::ai",
            LogTarget::Http => "tower_http",
        }
    }
}

impl FromStr for LogTarget {
    type Err = String;

    /// Accepts the short name (`sync`) or the full target (`studydeck::sync`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let short = s.strip_prefix("studydeck::").unwrap_or(s);
        match short {
            "startup" => Ok(LogTarget::Startup),
            "api" => Ok(LogTarget::Api),
            "auth" => Ok(LogTarget::Auth),
            "tools" => Ok(LogTarget::Tools),
            "sync" => Ok(LogTarget::Sync),
            "store" => Ok(LogTarget::Store),
            "ai" => Ok(LogTarget::Ai),
            "http" | "tower_http" => Ok(LogTarget::Http),
            _ => Err(format!("Unknown log target '{}'", s)),
        }
    }
}

/// How chatty the server is overall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    /// Lifecycle, accounts and tool events; background writes only when they fail.
    #[default]
    Normal,
    Verbose,
    /// Everything at DEBUG except per-save sync chatter.
    Debug,
    Trace,
}

impl Verbosity {
    /// From `-q` and the number of `-v` flags. `None` when neither was given.
    pub fn from_flags(quiet: bool, verbose: u8) -> Option<Self> {
        match (quiet, verbose) {
            (true, _) => Some(Verbosity::Quiet),
            (false, 0) => None,
            (false, 1) => Some(Verbosity::Verbose),
            (false, 2) => Some(Verbosity::Debug),
            (false, _) => Some(Verbosity::Trace),
        }
    }

    pub fn level_for(self, target: LogTarget) -> LevelFilter {
        use LogTarget::*;
        match (self, target) {
            (Verbosity::Quiet, Http) => LevelFilter::ERROR,
            (Verbosity::Quiet, _) => LevelFilter::WARN,
            (Verbosity::Normal, Startup | Api | Auth | Tools) => LevelFilter::INFO,
            (Verbosity::Normal, _) => LevelFilter::WARN,
            (Verbosity::Verbose, _) => LevelFilter::INFO,
            (Verbosity::Debug, Sync) => LevelFilter::INFO,
            (Verbosity::Debug, _) => LevelFilter::DEBUG,
            (Verbosity::Trace, _) => LevelFilter::TRACE,
        }
    }
}

/// The `[logging]` config file section.
///
/// ```toml
/// [logging]
/// verbosity = "verbose"
/// format = "json"
/// targets = { sync = "debug", ai = "trace" }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

/// Resolved logging setup.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub verbosity: Verbosity,
    pub format: LogFormat,
    /// Per-target levels that replace the preset's.
    pub levels: BTreeMap<LogTarget, LevelFilter>,
    /// Settings that could not be understood; reported once logging is up.
    pub rejected: Vec<String>,
}

impl LogConfig {
    /// Combine the config file section with command-line flags, flags winning.
    pub fn resolve(
        settings: &LoggingSettings,
        verbosity: Option<Verbosity>,
        format: Option<LogFormat>,
        overrides: &[String],
    ) -> Self {
        let mut config = Self {
            verbosity: verbosity.unwrap_or(settings.verbosity),
            format: format.unwrap_or(settings.format),
            ..Self::default()
        };

        for (target, level) in &settings.targets {
            config.set(target, level);
        }
        for entry in overrides.iter().flat_map(|o| o.split(',')) {
            match entry.split_once('=') {
                Some((target, level)) => config.set(target, level),
                None => config.rejected.push(entry.trim().to_string()),
            }
        }
        config
    }

    fn set(&mut self, target: &str, level: &str) {
        match (target.parse::<LogTarget>(), level.trim().parse::<LevelFilter>()) {
            (Ok(target), Ok(level)) => {
                self.levels.insert(target, level);
            }
            _ => self
                .rejected
                .push(format!("{}={}", target.trim(), level.trim())),
        }
    }

    pub fn level(&self, target: LogTarget) -> LevelFilter {
        self.levels
            .get(&target)
            .copied()
            .unwrap_or_else(|| self.verbosity.level_for(target))
    }

    /// `RUST_LOG` if set, otherwise one directive per target on top of
    /// ERROR for everything else.
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        LogTarget::ALL.iter().fold(
            EnvFilter::new("error"),
            |filter, &target| filter.add_directive(directive(target, self.level(target))),
        )
    }
}

fn directive(target: LogTarget, level: LevelFilter) -> Directive {
    format!("{}={}", target.as_str(), level)
        .parse()
        .unwrap_or_else(|_| level.into())
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    let (text, json) = match config.format {
        LogFormat::Text => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(config.build_filter())
        .with(text)
        .with(json)
        .try_init()?;

    for entry in &config.rejected {
        warn!(target: "studydeck::startup", "Ignoring log setting '{}'", entry);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(false, 0), None);
        assert_eq!(Verbosity::from_flags(false, 1), Some(Verbosity::Verbose));
        assert_eq!(Verbosity::from_flags(false, 2), Some(Verbosity::Debug));
        assert_eq!(Verbosity::from_flags(false, 5), Some(Verbosity::Trace));
        assert_eq!(Verbosity::from_flags(true, 3), Some(Verbosity::Quiet));
    }

    #[test]
    fn test_normal_keeps_background_writes_quiet() {
        let config = LogConfig::default();
        assert_eq!(config.level(LogTarget::Tools), LevelFilter::INFO);
        assert_eq!(config.level(LogTarget::Sync), LevelFilter::WARN);
        assert_eq!(config.level(LogTarget::Http), LevelFilter::WARN);
        assert_eq!(Verbosity::Debug.level_for(LogTarget::Sync), LevelFilter::INFO);
        assert_eq!(Verbosity::Debug.level_for(LogTarget::Ai), LevelFilter::DEBUG);
    }

    #[test]
    fn test_target_names() {
        assert_eq!("sync".parse::<LogTarget>(), Ok(LogTarget::Sync));
        assert_eq!("studydeck::store".parse::<LogTarget>(), Ok(LogTarget::Store));
        assert_eq!("tower_http".parse::<LogTarget>(), Ok(LogTarget::Http));
        assert!("hyper".parse::<LogTarget>().is_err());
        for target in LogTarget::ALL {
            assert_eq!(target.as_str().parse::<LogTarget>(), Ok(target));
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let settings: LoggingSettings = toml::from_str(
            r#"
            verbosity = "verbose"
            format = "json"
            targets = { sync = "debug", ai = "trace" }
            "#,
        )
        .unwrap();

        let from_file = LogConfig::resolve(&settings, None, None, &[]);
        assert_eq!(from_file.verbosity, Verbosity::Verbose);
        assert_eq!(from_file.format, LogFormat::Json);
        assert_eq!(from_file.level(LogTarget::Sync), LevelFilter::DEBUG);
        assert_eq!(from_file.level(LogTarget::Api), LevelFilter::INFO);

        let with_flags = LogConfig::resolve(
            &settings,
            Some(Verbosity::Quiet),
            Some(LogFormat::Text),
            &["ai=off,studydeck::tools=debug".to_string()],
        );
        assert_eq!(with_flags.format, LogFormat::Text);
        assert_eq!(with_flags.level(LogTarget::Ai), LevelFilter::OFF);
        assert_eq!(with_flags.level(LogTarget::Tools), LevelFilter::DEBUG);
        assert_eq!(with_flags.level(LogTarget::Sync), LevelFilter::DEBUG);
        assert_eq!(with_flags.level(LogTarget::Api), LevelFilter::WARN);
        assert!(with_flags.rejected.is_empty());
    }

    #[test]
    fn test_bad_entries_are_collected() {
        let config = LogConfig::resolve(
            &LoggingSettings::default(),
            None,
            None,
            &["api=loud".to_string(), "hyper=debug".to_string(), "store".to_string()],
        );

        assert_eq!(config.rejected, vec!["api=loud", "hyper=debug", "store"]);
        assert!(config.levels.is_empty());
    }

    #[test]
    fn test_directives_cover_every_target() {
        for target in LogTarget::ALL {
            let rendered = directive(target, LevelFilter::DEBUG).to_string();
            assert!(rendered.starts_with(target.as_str()), "{}", rendered);
        }
    }
}

use crate::config::ScenarioConfigOverrides;
use crate::trigger::AgentKind;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    trigger: Option<PathBuf>,
    agent: Option<AgentKind>,
    log: Option<String>,
    catalog: Option<PathBuf>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --config/--trigger/--agent/--log/--catalog with values.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "trigger" => overrides.trigger = Some(PathBuf::from(value)),
                "catalog" => overrides.catalog = Some(PathBuf::from(value)),
                "agent" => {
                    overrides.agent =
                        Some(value.parse::<AgentKind>().with_context(|| format!("Invalid agent '{value}'"))?);
                }
                "log" => overrides.log = Some(value),
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --trigger, --agent, --log, --catalog."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn trigger_path(&self) -> Option<&PathBuf> {
        self.trigger.as_ref()
    }

    pub fn agent(&self) -> Option<AgentKind> {
        self.agent
    }

    pub fn into_config_overrides(self) -> ScenarioConfigOverrides {
        ScenarioConfigOverrides { agent: self.agent, log_filter: self.log, catalog_path: self.catalog }
    }
}

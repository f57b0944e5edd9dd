use anyhow::Result;
use kestrel_scenario::cli::CliOverrides;
use kestrel_scenario::config::ScenarioConfig;
use kestrel_scenario::controllables::{BuiltinCatalogLoader, ControllablesManager, JsonCatalogLoader};
use kestrel_scenario::registry::EffectorRegistry;
use kestrel_scenario::trigger::{AgentKind, Trigger, TriggerId, TriggerSnapshot};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(cli) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: CliOverrides) -> Result<()> {
    let mut config = match cli.config_path() {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    let trigger_path = cli.trigger_path().cloned();
    let explicit_agent = cli.agent();
    config.apply_overrides(&cli.into_config_overrides());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.editor.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut registry = EffectorRegistry::new(config.effector_catalog()).with_undo_log(config.undo_history());
    let snapshot = trigger_path.as_deref().map(TriggerSnapshot::load_from_path).transpose()?;
    let agent = trigger_agent(explicit_agent, snapshot.as_ref(), config.editor.default_agent);
    let mut trigger = Trigger::new(TriggerId::new(0), agent);
    if let Some(snapshot) = &snapshot {
        registry.paste_all(&mut trigger, snapshot)?;
    }

    println!("Effector catalog:");
    for effector in registry.catalog().iter() {
        let unsupported: Vec<_> = effector.unsupported_agents().iter().map(|agent| agent.label()).collect();
        println!(
            "  {:<20} allow_many={:<5} unsupported=[{}]",
            effector.key(),
            effector.allow_many(),
            unsupported.join(", ")
        );
    }

    println!("Trigger {} ({} agent), {} attached:", trigger.id(), trigger.agent(), trigger.len());
    for instance in trigger.effectors() {
        println!("  {} {}", instance.id(), instance.type_key());
    }

    println!("Available:");
    for (index, entry) in registry.snapshot(&trigger).entries().iter().enumerate() {
        println!("  [{index}] {} ({})", entry.label(), entry.key());
    }

    let mut controllables = ControllablesManager::new();
    match &config.controllables.catalog_path {
        Some(path) => pollster::block_on(controllables.initialize(&JsonCatalogLoader::new(path.clone())))?,
        None => pollster::block_on(controllables.initialize(&BuiltinCatalogLoader))?,
    }
    println!("Controllable kinds:");
    for kind in controllables.catalog() {
        println!("  {:<16} default policy '{}'", kind.key, kind.default_policy);
    }
    Ok(())
}

/// `--agent` wins; otherwise a loaded trigger keeps the agent it was saved
/// with, and the configured default covers everything else.
fn trigger_agent(explicit: Option<AgentKind>, snapshot: Option<&TriggerSnapshot>, default: AgentKind) -> AgentKind {
    if let Some(agent) = explicit {
        return agent;
    }
    match snapshot.map(|snapshot| snapshot.source_agent) {
        Some(agent) if agent != AgentKind::Unknown => agent,
        _ => default,
    }
}

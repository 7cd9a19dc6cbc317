use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::Summary;
use prowlarr::Client;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::{self, Config, InstanceConfig, LinkedInstances};
use crate::settings::{Links, Settings, SyncContext};
use crate::ui;

type InstanceResult = (usize, String, Result<Summary>);

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    ui::header("Applying Configuration");

    let path = config::resolve_path(args.config.as_deref())?;
    let config = Config::load(&path)?;
    let instances = config.instances(&args.instances)?;

    if !ctx.quiet {
        ui::kv("Config", &path.display().to_string());
        ui::kv("Instances", &instances.len().to_string());
        println!();
    }

    let jobs = usize::from(args.jobs.max(1)).min(instances.len().max(1));
    let results: Arc<Mutex<Vec<InstanceResult>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        instances
            .par_iter()
            .enumerate()
            .for_each(|(i, (name, instance))| {
                let result = apply_instance(instance, &config.links, args.check_unmanaged)
                    .with_context(|| format!("Failed to apply instance '{name}'"));
                push_result(&results, (i, (*name).to_string(), result));
            });
    });

    let mut results = into_results(results)?;
    results.sort_by_key(|(i, _, _)| *i);

    let mut total = Summary::default();
    let mut failed = 0;
    let mut unreachable = 0;
    for (_, name, result) in results {
        match result {
            Ok(summary) => {
                total.merge(&summary);
                if summary.has_changes() {
                    ui::success(&format!("{}: {summary}", name.bold()));
                } else if !ctx.quiet {
                    ui::info(&format!("{}: up to date", name.bold()));
                }
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("{e:#}"));
                if let Some(hint) = Hint::of(&e) {
                    ui::kv(hint.description, hint.advice);
                    if hint.retryable {
                        unreachable += 1;
                    }
                }
            }
        }
    }

    if unreachable > 0 {
        bail!(
            "{failed} of {} instances failed ({unreachable} unreachable)",
            instances.len()
        );
    }
    if failed > 0 {
        bail!("{failed} of {} instances failed", instances.len());
    }

    if !ctx.quiet {
        println!();
        ui::success(&format!("Apply complete! {total}"));
    }
    Ok(())
}

/// Resolve an instance's credentials and converge it.
fn apply_instance(
    instance: &InstanceConfig,
    links: &LinkedInstances,
    check_unmanaged: bool,
) -> Result<Summary> {
    let connection = instance.connection();
    let credentials = connection
        .resolve()
        .with_context(|| format!("Unable to connect to {}", connection.host_url()))?;
    let version = instance.version.as_deref().unwrap_or(&credentials.version);
    converge(
        credentials.client(),
        version,
        &instance.settings,
        links,
        check_unmanaged,
    )
}

/// Read the remote settings, create and update, then delete.
pub(crate) fn converge(
    client: &Client,
    version: &str,
    settings: &Settings,
    links: &dyn Links,
    check_unmanaged: bool,
) -> Result<Summary> {
    let ctx = SyncContext::new(client, version, links).check_unmanaged(check_unmanaged);
    let remote = Settings::from_remote(&ctx)?;
    let mut summary = settings.update_remote(&ctx, &remote)?;
    summary.merge(&settings.delete_remote(&ctx, &remote)?);
    Ok(summary)
}

/// User feedback for the first categorized error in a failure chain.
#[derive(Debug, PartialEq, Eq)]
struct Hint {
    description: &'static str,
    advice: &'static str,
    retryable: bool,
}

impl Hint {
    fn of(e: &anyhow::Error) -> Option<Self> {
        e.chain().find_map(|cause| {
            if let Some(err) = cause.downcast_ref::<prowlarr::Error>() {
                let category = err.category();
                return Some(Self {
                    description: category.description(),
                    advice: category.advice(),
                    retryable: err.is_retryable(),
                });
            }
            cause.downcast_ref::<declarative::Error>().map(|err| {
                let category = err.category();
                Self {
                    description: category.description(),
                    advice: category.advice(),
                    retryable: false,
                }
            })
        })
    }
}

fn push_result(results: &Arc<Mutex<Vec<InstanceResult>>>, result: InstanceResult) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_results(results: Arc<Mutex<Vec<InstanceResult>>>) -> Result<Vec<InstanceResult>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::testing::{self, client, writes};
    use crate::settings::{NoLinks, TAG_PATH};
    use serde_json::json;

    fn settings(toml: &str) -> Settings {
        let mut settings: Settings = toml::from_str(toml).unwrap();
        settings.validate().unwrap();
        settings
    }

    #[test]
    fn test_converge_creates_missing_tag() {
        let mock = testing::instance(&[(TAG_PATH, json!([{"id": 1, "label": "private"}]))]);
        let client = client(&mock);
        let local = settings(
            r#"
            [tags]
            definitions = ["private", "anime"]

            [ui]
            theme = "auto"
            "#,
        );

        let summary = converge(&client, "1.13.3.4273", &local, &NoLinks, false).unwrap();

        assert_eq!((summary.created, summary.unchanged), (1, 2));
        assert_eq!(writes(&mock), vec![format!("POST {TAG_PATH}")]);
    }

    #[test]
    fn test_converge_matching_configuration_makes_no_writes() {
        let mock = testing::instance(&[(
            "/api/v1/appprofile",
            json!([{"id": 1, "name": "Standard", "enableRss": true, "enableInteractiveSearch": true, "enableAutomaticSearch": true, "minimumSeeders": 1}]),
        )]);
        let client = client(&mock);
        let local = settings(
            r#"
            [apps.sync_profiles.definitions.Standard]

            [ui]
            theme = "auto"
            "#,
        );

        let summary = converge(&client, "1.13.3.4273", &local, &NoLinks, false).unwrap();

        assert!(!summary.has_changes(), "{summary}");
        assert!(writes(&mock).is_empty());
    }

    #[test]
    fn test_converge_deletes_after_updates() {
        let mock = testing::instance(&[(
            "/api/v1/appprofile",
            json!([{"id": 7, "name": "Old", "enableRss": true, "enableInteractiveSearch": true, "enableAutomaticSearch": true, "minimumSeeders": 1}]),
        )]);
        let client = client(&mock);
        let local = settings(
            r#"
            [apps.sync_profiles]
            delete_unmanaged = true

            [apps.sync_profiles.definitions.New]
            minimum_seeders = 2
            "#,
        );

        let summary = converge(&client, "1.13.3.4273", &local, &NoLinks, true).unwrap();

        assert_eq!((summary.created, summary.deleted), (1, 1));
        assert_eq!(
            writes(&mock),
            vec![
                "POST /api/v1/appprofile".to_string(),
                "PUT /api/v1/config/ui/1".to_string(),
                "DELETE /api/v1/appprofile/7".to_string(),
            ]
        );
    }

    #[test]
    fn test_hint_from_gateway_error() {
        let e = anyhow::Error::from(prowlarr::Error::transport(
            "http://prowlarr:9696/api/v1/system/status",
            "connection refused",
        ))
        .context("Unable to connect to http://prowlarr:9696");

        let hint = Hint::of(&e).unwrap();

        assert_eq!(hint.description, "Network connectivity issue");
        assert!(hint.retryable);
    }

    #[test]
    fn test_hint_from_mapping_error() {
        let mut ui = crate::settings::ui::tests::remote_ui();
        ui["theme"] = json!("solarized");
        let mock = testing::instance(&[(crate::settings::ui::PATH, ui)]);
        let client = client(&mock);
        let local = settings("[tags]\n");

        let e = converge(&client, "1.13.3.4273", &local, &NoLinks, false).unwrap_err();
        let hint = Hint::of(&e).unwrap();

        assert_eq!(hint.description, "Unexpected remote data");
        assert!(!hint.retryable);
        assert!(Hint::of(&anyhow::anyhow!("plain failure")).is_none());
    }

    #[test]
    fn test_into_results_recovers_from_poisoned_mutex() {
        let results: Arc<Mutex<Vec<InstanceResult>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let mut guard = poisoned.lock().expect("lock should succeed before poisoning");
            guard.push((0, "main".to_string(), Ok(Summary::default())));
            panic!("intentional poison");
        })
        .join();

        push_result(&results, (1, "backup".to_string(), Ok(Summary::default())));
        let collected = into_results(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 2);
    }
}

//! End-to-end integration tests for tablerun
//!
//! These tests verify the complete flow by:
//! 1. Loading suites and step tables from `tests/fixtures`
//! 2. Running them through the runner against an in-memory driver
//! 3. Invoking the compiled binary for the read-only subcommands

use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tablerun::common::config::Config;
use tablerun::driver::{Driver, Element, Locator, Rect};
use tablerun::runner::{MemoryReporter, StepOutcome};
use tablerun::step::QuitUnit;
use tablerun::{Error, Result, Runner, SourceLoader, SourceSpec, Suite};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

// ============== In-memory driver ==============

#[derive(Clone, Default)]
struct PageElement {
    text: String,
    tag: String,
    displayed: bool,
    attributes: HashMap<String, String>,
}

#[async_trait]
impl Element for PageElement {
    async fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(true)
    }

    async fn is_displayed(&self) -> Result<bool> {
        Ok(self.displayed)
    }

    async fn is_selected(&self) -> Result<bool> {
        Ok(false)
    }

    async fn rect(&self) -> Result<Rect> {
        Ok(Rect::default())
    }

    async fn tag_name(&self) -> Result<String> {
        Ok(self.tag.clone())
    }

    async fn css_value(&self, _property: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.attributes.get(name).cloned())
    }
}

/// A shop page whose elements are keyed by locator value
struct ShopPage {
    elements: HashMap<String, PageElement>,
}

impl ShopPage {
    fn new() -> Self {
        let mut elements = HashMap::new();
        elements.insert(
            "[id=\"greeting\"]".to_string(),
            PageElement {
                text: "Hello alice".to_string(),
                tag: "p".to_string(),
                displayed: true,
                ..PageElement::default()
            },
        );
        elements.insert(
            "[name=\"q\"]".to_string(),
            PageElement {
                tag: "input".to_string(),
                displayed: true,
                attributes: HashMap::from([("type".to_string(), "search".to_string())]),
                ..PageElement::default()
            },
        );
        elements.insert(
            "h1".to_string(),
            PageElement {
                text: "Shop".to_string(),
                tag: "h1".to_string(),
                displayed: true,
                ..PageElement::default()
            },
        );
        Self { elements }
    }
}

#[async_trait]
impl Driver for ShopPage {
    fn session_id(&self) -> &str {
        "shop-session"
    }

    async fn title(&self) -> Result<String> {
        Ok("Shop".to_string())
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://shop.test/checkout".to_string())
    }

    async fn page_source(&self) -> Result<String> {
        Ok("<html><h1>Shop</h1></html>".to_string())
    }

    async fn window_handle(&self) -> Result<String> {
        Ok("w-1".to_string())
    }

    async fn find_element(&self, locator: &Locator) -> Result<Box<dyn Element>> {
        self.elements
            .get(&locator.value)
            .cloned()
            .map(|e| Box::new(e) as Box<dyn Element>)
            .ok_or_else(|| Error::ElementNotFound {
                strategy: locator.strategy.to_string(),
                value: locator.value.clone(),
            })
    }
}

fn shop_config() -> Config {
    let mut config = Config::default();
    config.loader.load_folder = fixtures_dir().join("generators").display().to_string();
    config.loader.external = vec!["acme.Checks".to_string()];
    config
}

fn shop_runner() -> Runner<MemoryReporter> {
    let mut runner = Runner::new(&shop_config(), MemoryReporter::default());
    runner.context_mut().attach_driver(Box::new(ShopPage::new()));
    runner
}

// ============== Library tests ==============

#[tokio::test]
async fn test_suite_end_to_end() {
    let suite = Suite::load(&fixtures_dir().join("suite.yaml")).expect("suite loads");
    let mut runner = shop_runner();
    let result = runner.run_suite(&suite).await;

    assert_eq!(result.cases.len(), 3);
    assert!(!result.quit_session);
    assert!(!result.passed());
    assert_eq!(result.failed_cases(), 1);

    let landing = &result.cases[0];
    assert!(landing.passed, "landing page case: {:?}", landing);
    assert_eq!(landing.steps_total, 7);
    assert_eq!(landing.steps_run, 5);
    assert_eq!(landing.skipped, 1);

    let checkout = &result.cases[1];
    assert!(!checkout.passed);
    assert_eq!(checkout.quit, Some(QuitUnit::TestCase));
    assert_eq!(checkout.steps_run, 2);

    let generated = &result.cases[2];
    assert!(generated.passed, "generated case: {:?}", generated);
    assert_eq!(generated.steps_run, 2);

    let vars = &runner.context().variables;
    assert_eq!(vars.get("title"), Some("Shop"));
    assert_eq!(vars.get("seen"), Some("Hello alice"));
    assert_eq!(vars.get("url"), Some("https://shop.test/checkout"));
    assert_eq!(vars.get("visible"), Some("true"));
}

#[tokio::test]
async fn test_reported_steps() {
    let suite = Suite::load(&fixtures_dir().join("suite.yaml")).unwrap();
    let mut runner = shop_runner();
    runner.run_suite(&suite).await;

    let steps = runner.reporter().steps();
    let outcome = |id: &str| {
        steps
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.outcome)
            .unwrap_or_else(|| panic!("no report for {}", id))
    };

    assert_eq!(outcome("L4"), StepOutcome::Passed);
    assert_eq!(outcome("L5"), StepOutcome::Skipped);
    assert_eq!(outcome("L6"), StepOutcome::Inactive);
    assert_eq!(outcome("C2"), StepOutcome::Failed);
    assert!(steps.iter().all(|s| s.id != "C3"));

    let lines = runner.reporter().lines();
    assert!(lines.iter().any(|l| l.contains("Open https://shop.test")));
    assert!(lines.iter().any(|l| l.contains("Greeting for alice")));
    assert!(lines.iter().any(|l| l.contains("Visible: true")));

    let c2 = steps.iter().find(|s| s.id == "C2").unwrap();
    assert!(c2.errors.iter().any(|e| e.contains("getattribute")));
}

#[tokio::test]
async fn test_loader_formats_agree() {
    let config = shop_config();
    let mut loader = SourceLoader::new(&config.loader);
    loader.set_data_folder(fixtures_dir());

    let xml = loader.load(&SourceSpec::parse("file,steps.xml").unwrap()).await;
    assert_eq!(xml.len(), 7);
    assert_eq!(xml[2].data(), "saveas=greeting");
    assert_eq!(xml[2].locator_type(), "id");

    let html = loader
        .load(&SourceSpec::parse("file,steps.html,checkout").unwrap())
        .await;
    assert_eq!(html.len(), 3);
    assert_eq!(html[0].query_function(), "getcurrenturl");

    let external = loader.load(&SourceSpec::parse("inline,acme.Checks").unwrap()).await;
    assert_eq!(external.len(), 2);
    assert_eq!(external[1].description(), "Visible: ${visible}");

    assert!(loader
        .load(&SourceSpec::parse("file,steps.csv").unwrap())
        .await
        .is_empty());
}

#[tokio::test]
async fn test_unlisted_generator_is_not_resolved_externally() {
    let mut config = shop_config();
    config.loader.external.clear();
    let mut loader = SourceLoader::new(&config.loader);

    let spec = SourceSpec::parse("inline,acme.Checks").unwrap();
    assert!(loader.load(&spec).await.is_empty());
    assert!(matches!(
        loader.try_load(&spec).await,
        Err(Error::GeneratorNotFound { .. })
    ));
}

// ============== Binary tests ==============

/// Isolated environment for running the binary
struct CliContext {
    temp_dir: tempfile::TempDir,
}

/// Output from a tablerun invocation
#[derive(Debug)]
struct CliOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

impl CliContext {
    fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    fn write_config(&self, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join("config.toml");
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    fn run(&self, args: &[&str]) -> CliOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_tablerun"))
            .args(args)
            .env("XDG_CONFIG_HOME", self.temp_dir.path().join("config"))
            .env("XDG_DATA_HOME", self.temp_dir.path().join("data"))
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to run tablerun");

        CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.success,
            "tablerun {:?} failed:\nstdout: {}\nstderr: {}",
            args, output.stdout, output.stderr
        );
        output.stdout
    }
}

#[test]
fn test_policy_command() {
    let ctx = CliContext::new();

    let stdout = ctx.run_ok(&["policy", "SUN3"]);
    assert!(stdout.contains("Skip 3 steps Un-conditionally"), "{}", stdout);
    assert!(stdout.contains("On PASS: skip 3 steps"));

    let stdout = ctx.run_ok(&["policy", "qtof"]);
    assert!(stdout.contains("Quit TEST_CASE on FAIL"));
    assert!(stdout.contains("On PASS: continue"));

    let output = ctx.run(&["policy", "ZZZ"]);
    assert!(!output.success);
    assert!(output.stdout.contains("Invalid"));
}

#[test]
fn test_load_command_json() {
    let ctx = CliContext::new();
    let folder = fixtures_dir().display().to_string();
    let stdout = ctx.run_ok(&["load", "file,steps.xml", "--data-folder", &folder, "--json"]);

    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).expect("JSON output");
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0]["id"], "L1");
    assert_eq!(rows[6]["action"], "setvar");
}

#[test]
fn test_load_command_rejects_unsupported_source() {
    let ctx = CliContext::new();
    let output = ctx.run(&["load", "file,steps.csv"]);
    assert!(!output.success);
    assert!(output.stderr.contains("Unsupported step source"), "{}", output.stderr);
}

#[test]
fn test_generators_command_reads_config() {
    let ctx = CliContext::new();
    let config = ctx.write_config(
        r#"
[loader]
load_folder = "https://plugins.example/generators"
external = ["acme.Checks"]
"#,
    );
    let config = config.display().to_string();
    let stdout = ctx.run_ok(&["--config", &config, "generators", "--json"]);

    let listing: serde_json::Value = serde_json::from_str(&stdout).expect("JSON output");
    assert_eq!(listing["external"]["names"][0], "acme.Checks");
    assert_eq!(
        listing["external"]["load_folder"],
        "https://plugins.example/generators"
    );
    let registered = listing["registered"].as_array().unwrap();
    assert!(registered.iter().any(|g| g["name"] == "builtin.rows"));
}

#[test]
fn test_run_without_driver_fails_queries() {
    let ctx = CliContext::new();
    let suite = fixtures_dir().join("suite.yaml").display().to_string();
    let output = ctx.run(&["run", &suite, "--no-driver"]);

    assert!(!output.success);
    assert!(output.stdout.contains("Running Suite:"), "{}", output.stdout);
    assert!(output.stdout.contains("No automation session"), "{}", output.stdout);
}

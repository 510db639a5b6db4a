use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

const APP_CONFIG: &str = "export default defineAppConfig({\n  pages: [\n    'pages/a/index',\n    'pages/b/index',\n  ],\n  subPackages: [\n    { root: 'pkg/', pages: ['pages/x/index', 'pages/y/index'] },\n  ],\n  tabBar: {\n    list: [{ pagePath: 'pages/b/index', text: 'B' }],\n  },\n})\n";

fn project() -> Result<TempDir, Box<dyn Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::write(dir.path().join("src/app.config.ts"), APP_CONFIG)?;
    Ok(dir)
}

fn cli(project: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("page-picker")?;
    cmd.env_remove("RUST_LOG")
        .env_remove("PAGE_PICKER_PROJECT")
        .arg("--project")
        .arg(project)
        .arg("--state-dir")
        .arg(project.join("state"));
    Ok(cmd)
}

fn entry_text(project: &Path) -> Result<String, Box<dyn Error>> {
    Ok(fs::read_to_string(project.join("src/app.config.ts"))?)
}

#[test]
fn tree_lists_pages_with_roles() -> Result<(), Box<dyn Error>> {
    let dir = project()?;
    cli(dir.path())?
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("pages (1/2)"))
        .stdout(predicate::str::contains("  [T] pages/b/index"))
        .stdout(predicate::str::contains("  [ ] pages/a/index"))
        .stdout(predicate::str::contains("subPackages (1)"))
        .stdout(predicate::str::contains("    [ ] pkg/pages/x/index"))
        .stdout(predicate::str::contains("picked (1/4)"));
    Ok(())
}

#[test]
fn pick_save_revert_round_trip() -> Result<(), Box<dyn Error>> {
    let dir = project()?;

    cli(dir.path())?
        .args(["entry", "pages/a/index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages/a/index: set as entry"));
    cli(dir.path())?
        .args(["pick", "pkg/pages/y/index"])
        .assert()
        .success();
    // Mutations only touch the sidecar until `save`.
    assert_eq!(entry_text(dir.path())?, APP_CONFIG);
    assert!(dir.path().join(".vscode/page-picker.json").exists());

    cli(dir.path())?
        .arg("save")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 2 page(s) and 1 sub-package(s)"));
    let written = entry_text(dir.path())?;
    assert!(written.starts_with("/* PAGE-PICKER-GENERATED"));
    assert!(written.contains("pages: [\n    'pages/a/index',\n    'pages/b/index'\n  ],"));
    assert!(written.contains("pages: [\n        'pages/y/index'\n      ]"));
    assert!(written.ends_with("})\n/* PAGE-PICKER-GENERATED: generated by page-picker, do not edit. Run `page-picker revert` to restore the original file. */\n"));

    cli(dir.path())?
        .args(["tree", "--picked-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[E] pages/a/index"))
        .stdout(predicate::str::contains("pkg/pages/x/index").not());

    cli(dir.path())?
        .arg("revert")
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"));
    assert_eq!(entry_text(dir.path())?, APP_CONFIG);

    cli(dir.path())?
        .arg("revert")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to revert: the entry file is not generated"));
    Ok(())
}

#[test]
fn unpick_all_keeps_tabbar_pages() -> Result<(), Box<dyn Error>> {
    let dir = project()?;
    cli(dir.path())?
        .args(["pick-all", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("main: 1 page(s) picked (2/2)"));
    cli(dir.path())?
        .args(["unpick-all", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("main: 1 page(s) unpicked (1/2)"));
    cli(dir.path())?
        .args(["unpick", "pages/b/index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages/b/index: unchanged"));

    let output = cli(dir.path())?.args(["--json", "tree"]).output()?;
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["summary"], "(1/4)");
    let main = &value["tree"][0];
    assert_eq!(main["children"][0]["id"], "pages/b/index");
    // The tab bar page inherited the entry when `pages/a/index` was unpicked.
    assert_eq!(main["children"][0]["role"], "page_entry");
    assert_eq!(main["children"][1]["role"], "page_unpicked");
    Ok(())
}

#[test]
fn unknown_ids_and_scopes_fail() -> Result<(), Box<dyn Error>> {
    let dir = project()?;
    cli(dir.path())?
        .args(["pick", "pages/missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: unknown page id `pages/missing`"));
    cli(dir.path())?
        .args(["pick-all", "nope/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scope `nope/`"));
    cli(dir.path())?
        .args(["entry", "pkg/pages/x/index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
    Ok(())
}

#[test]
fn missing_configuration_is_reported_not_fatal() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    cli(dir.path())?
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("no page configuration found"));
    cli(dir.path())?
        .arg("save")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no page configuration found"));
    Ok(())
}

#[test]
fn settings_toggle_picked_only_view() -> Result<(), Box<dyn Error>> {
    let dir = project()?;
    cli(dir.path())?
        .args(["settings", "picked-only", "true"])
        .assert()
        .success();
    assert!(dir
        .path()
        .join(".vscode/page-picker.settings.json")
        .exists());

    cli(dir.path())?
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("pages/a/index").not());
    cli(dir.path())?
        .args(["tree", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages/a/index"));

    let output = cli(dir.path())?.args(["settings", "show", "--json"]).output()?;
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["show_picked_only"], true);
    Ok(())
}

#[test]
fn locate_prints_page_source() -> Result<(), Box<dyn Error>> {
    let dir = project()?;
    let page_dir = dir.path().join("src/pkg/pages/x");
    fs::create_dir_all(&page_dir)?;
    fs::write(page_dir.join("index.tsx"), "export default () => null\n")?;

    cli(dir.path())?
        .args(["locate", "pkg/pages/x/index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("index.tsx"));
    cli(dir.path())?
        .args(["locate", "pages/a/index"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no source file found"));
    Ok(())
}

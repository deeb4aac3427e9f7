use bibscreen::{parse_bibliography, parse_file, BibRecord, Config};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn bibscreen(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bibscreen"))
        .args(args)
        .current_dir(dir)
        .env_remove("BIBSCREEN_CONFIG")
        .env("RUST_LOG", "bibscreen=error")
        .output()
        .expect("Failed to execute bibscreen")
}

fn bibscreen_with_config(args: &[&str], dir: &Path, config: &str) -> Output {
    let config_path = dir.join("screen.toml");
    fs::write(&config_path, config).unwrap();
    Command::new(env!("CARGO_BIN_EXE_bibscreen"))
        .args(args)
        .current_dir(dir)
        .env("BIBSCREEN_CONFIG", &config_path)
        .env("RUST_LOG", "bibscreen=error")
        .output()
        .expect("Failed to execute bibscreen")
}

fn keys(path: &Path) -> Vec<String> {
    parse_file(path)
        .unwrap()
        .records()
        .map(|r| r.key.clone())
        .collect()
}

fn sources<'a>(records: impl Iterator<Item = &'a BibRecord>) -> Vec<String> {
    records.map(|r| r.source().unwrap().to_string()).collect()
}

#[test]
fn types_command_filters_and_preserves_text() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture("corpus.bib"), dir.path().join("non-duplicate.bib")).unwrap();

    let output = bibscreen(&["types"], dir.path());
    assert!(output.status.success(), "{:?}", output);

    let out_path = dir.path().join("filtered_nodup.bib");
    assert_eq!(
        keys(&out_path),
        vec![
            "rahman2019seven",
            "sharma2016smells",
            "compilers2018",
            "opdebeeck2020"
        ]
    );

    // Surviving entries are byte-identical to the input
    let input = parse_file(&fixture("corpus.bib")).unwrap();
    let filtered = parse_file(&out_path).unwrap();
    let expected: Vec<String> = sources(input.records().filter(|r| {
        filtered.records().any(|kept| kept.key == r.key)
    }));
    assert_eq!(sources(filtered.records()), expected);

    let written = fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("% Deduplicated export"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    insta::assert_snapshot!(stdout, @r###"
    [type filter] processed 7 entries.
      removed 1 (excluded_type:book)
      removed 1 (excluded_type:proceedings)
      removed 1 (missing_title)
      kept 4, discarded 3. Written to filtered_nodup.bib
    "###);
}

#[test]
fn types_command_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.bib");
    let second = dir.path().join("second.bib");

    let out = bibscreen(
        &[
            "types",
            fixture("corpus.bib").to_str().unwrap(),
            first.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert!(out.status.success());
    let out = bibscreen(
        &["types", first.to_str().unwrap(), second.to_str().unwrap()],
        dir.path(),
    );
    assert!(out.status.success());

    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn keywords_command_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture("corpus.bib"), dir.path().join("non-duplicate.bib")).unwrap();
    assert!(bibscreen(&["types"], dir.path()).status.success());

    let output = bibscreen(
        &[
            "keywords",
            "filtered_nodup.bib",
            "screened.bib",
            "included.csv",
            "excluded.csv",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "{:?}", output);

    assert_eq!(
        keys(&dir.path().join("screened.bib")),
        vec!["rahman2019seven", "sharma2016smells"]
    );

    let excluded = fs::read_to_string(dir.path().join("excluded.csv")).unwrap();
    insta::assert_snapshot!(excluded, @r###"
    key,title,reason
    compilers2018,Register Allocation Revisited,no_domain_term
    opdebeeck2020,Andromeda: A Dataset of Ansible Galaxy Roles,no_quality_term
    "###);

    let included = fs::read_to_string(dir.path().join("included.csv")).unwrap();
    assert!(included.starts_with("key,title,domain_matches,quality_matches\n"));
    assert!(included.contains("sharma2016smells,Does Your Configuration Code Smell?,puppet,code smell;smell\n"));
}

#[test]
fn run_command_chains_both_stages() {
    let dir = tempfile::tempdir().unwrap();
    let output = bibscreen(
        &[
            "run",
            fixture("corpus.bib").to_str().unwrap(),
            "filtered.bib",
            "screened.bib",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "{:?}", output);

    assert_eq!(keys(&dir.path().join("filtered.bib")).len(), 4);
    assert_eq!(
        keys(&dir.path().join("screened.bib")),
        vec!["rahman2019seven", "sharma2016smells"]
    );
}

#[test]
fn run_command_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    let output = bibscreen(
        &[
            "run",
            fixture("corpus.bib").to_str().unwrap(),
            "filtered.bib",
            "screened.bib",
            "included.csv",
            "excluded.csv",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "{:?}", output);

    let excluded = fs::read_to_string(dir.path().join("excluded.csv")).unwrap();
    insta::assert_snapshot!(excluded, @r###"
    key,title,reason
    compilers2018,Register Allocation Revisited,no_domain_term
    opdebeeck2020,Andromeda: A Dataset of Ansible Galaxy Roles,no_quality_term
    "###);

    let included = fs::read_to_string(dir.path().join("included.csv")).unwrap();
    assert_eq!(included.lines().count(), 3);
    assert!(included.contains("\nrahman2019seven,"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[type filter] processed 7 entries."), "{}", stdout);
    assert!(stdout.contains("  included CSV: included.csv"), "{}", stdout);
}

#[test]
fn unwritable_report_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture("corpus.bib"), dir.path().join("filtered_nodup.bib")).unwrap();

    let output = bibscreen(
        &[
            "keywords",
            "filtered_nodup.bib",
            "screened.bib",
            "missing_dir/included.csv",
        ],
        dir.path(),
    );

    assert!(!output.status.success());
    assert!(!dir.path().join("screened.bib").exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing_dir/included.csv"), "{}", stderr);
}

#[test]
fn failed_pipeline_writes_neither_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = bibscreen(
        &[
            "run",
            fixture("corpus.bib").to_str().unwrap(),
            "filtered.bib",
            "screened.bib",
            "missing_dir/included.csv",
        ],
        dir.path(),
    );

    assert!(!output.status.success());
    assert!(!dir.path().join("filtered.bib").exists());
    assert!(!dir.path().join("screened.bib").exists());
}

#[test]
fn word_match_mode_applies_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("filtered_nodup.bib"),
        "\
@article{harm2022,
  title = {Harmful defaults in deployment scripts},
  abstract = {A security smell catalog.}
}

@article{arm2021,
  title = {Linting ARM templates},
  abstract = {Code smell detection for cloud templates.}
}
",
    )
    .unwrap();
    let terms = "domain_terms = [\"arm\"]\nquality_terms = [\"smell\"]\n";

    let output = bibscreen_with_config(
        &["keywords"],
        dir.path(),
        &format!("{}match_mode = \"substring\"\n", terms),
    );
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(
        keys(&dir.path().join("screened.bib")),
        vec!["harm2022", "arm2021"]
    );

    let output = bibscreen_with_config(
        &["keywords"],
        dir.path(),
        &format!("{}match_mode = \"word\"\n", terms),
    );
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(keys(&dir.path().join("screened.bib")), vec!["arm2021"]);
}

#[test]
fn parse_failure_exits_non_zero_without_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("non-duplicate.bib"),
        "@article{ok, title = {Fine}}\n@article{broken, title = {never closed}\n",
    )
    .unwrap();

    let output = bibscreen(&["types"], dir.path());

    assert!(!output.status.success());
    assert!(!dir.path().join("filtered_nodup.bib").exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Parse error"), "{}", stderr);
}

#[test]
fn missing_input_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = bibscreen(&["keywords"], dir.path());
    assert!(!output.status.success());
    assert!(!dir.path().join("screened.bib").exists());
}

#[test]
fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("screen.toml");
    fs::write(
        &config,
        "domain_terms = [\"register allocation\"]\nquality_terms = [\"testing\"]\n",
    )
    .unwrap();
    fs::copy(fixture("corpus.bib"), dir.path().join("filtered_nodup.bib")).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bibscreen"))
        .arg("keywords")
        .current_dir(dir.path())
        .env("BIBSCREEN_CONFIG", &config)
        .env("RUST_LOG", "bibscreen=error")
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    assert_eq!(keys(&dir.path().join("screened.bib")), vec!["compilers2018"]);
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("screen.toml");
    fs::write(&config, "domain_terms = []\n").unwrap();
    fs::copy(fixture("corpus.bib"), dir.path().join("non-duplicate.bib")).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bibscreen"))
        .arg("types")
        .current_dir(dir.path())
        .env("BIBSCREEN_CONFIG", &config)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("domain_terms must not be empty"), "{}", stderr);
}

#[test]
fn defaults_command_prints_loadable_toml() {
    let dir = tempfile::tempdir().unwrap();
    let output = bibscreen(&["defaults"], dir.path());
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(Config::from_toml_str(&stdout).unwrap(), Config::default());
}

#[test]
fn verbatim_blocks_survive_screening() {
    let bib = parse_bibliography(
        "@comment{jabref-meta: databaseType:bibtex;}\n@string{ieee = {IEEE}}\n@misc{a, title = {IaC linting}, abstract = {}}\n",
    )
    .unwrap();
    let mut screened = bib.clone();
    let screen = Config::default().keyword_screen().unwrap();
    bibscreen::apply_filter(&mut screened, &screen);

    assert_eq!(screened.to_bibtex(), bib.to_bibtex());
}

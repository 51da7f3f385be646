use super::{inputs, sandbox_exec, script_text};
use gomod_patcher::preprocess::preprocess;
use gomod_patcher::spec::{load_from_str, SpecFormat};

const MULTI_MODULE: &str = r#"
sources:
  app:
    git:
      url: https://github.com/example/monorepo.git
      commit: 4f1c2d
    generate:
      - subpath: src
        gomod:
          paths: [".", "tools"]
          edits:
            replace:
              - "github.com/old/dep:github.com/new/dep@v1.4.0"
      - subpath: plugins/extra
        gomod:
          edits:
            require:
              - module: golang.org/x/net
                version: golang.org/x/net@v0.30.0
"#;

const LOOKALIKE_NAMES: &str = r#"
sources:
  app:
    context: {}
    generate:
      - gomod:
          edits:
            require: ["example.com/a:example.com/a@v1.2.0"]
      - gomod:
          edits:
            require: ["example.com/b:example.com/b@v1.0.0"]
  app_1:
    context: {}
    generate:
      - gomod:
          edits:
            require: ["example.com/c:example.com/c@v0.3.0"]
"#;

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("script is missing {needle:?}"))
}

#[test]
fn test_paths_share_one_patch() {
    let mut spec = load_from_str(MULTI_MODULE, SpecFormat::Yaml).unwrap();
    let generated = preprocess(&mut spec, &inputs()).unwrap();

    assert_eq!(generated.len(), 2);
    assert_eq!(spec.patches["app"].len(), 2);

    let script = script_text(sandbox_exec(&generated[0].state));
    assert_eq!(script.matches(": > \"$patch_file\"").count(), 1);
    assert_eq!(script.matches("go mod tidy").count(), 2);

    let root = position(script, "--label a/src/go.mod --label b/src/go.mod");
    let tools = position(script, "--label a/src/tools/go.mod --label b/src/tools/go.mod");
    assert!(root < tools);

    assert!(script.contains("cd /work/src/app/src\n"));
    assert!(script.contains("cd /work/src/app/src/tools\n"));
    assert!(script.contains("--label a/src/tools/go.sum"));
    assert!(script.contains("patch_file=/tmp/patch-work/gomod.patch"));
}

#[test]
fn test_each_generator_gets_its_own_artifact() {
    let mut spec = load_from_str(MULTI_MODULE, SpecFormat::Yaml).unwrap();
    let generated = preprocess(&mut spec, &inputs()).unwrap();

    let names: Vec<_> = generated.iter().map(|p| p.patch_source.as_str()).collect();
    assert_eq!(names, vec!["__gomod_patch_app", "__gomod_patch_app#1"]);

    let refs: Vec<_> = spec.patches["app"]
        .iter()
        .map(|p| (p.source.as_str(), p.path.as_deref(), p.strip_count()))
        .collect();
    assert_eq!(
        refs,
        vec![
            ("__gomod_patch_app", Some("gomod.patch"), 1),
            ("__gomod_patch_app#1", Some("gomod.patch"), 1),
        ]
    );

    let second = script_text(sandbox_exec(&generated[1].state));
    assert!(second.contains("go mod edit -require=golang.org/x/net@v0.30.0"));
    assert!(second.contains("--label a/plugins/extra/go.mod"));
    assert!(!second.contains("github.com/new/dep"));
}

#[test]
fn test_script_is_stable_across_runs() {
    let render = || {
        let mut spec = load_from_str(MULTI_MODULE, SpecFormat::Yaml).unwrap();
        let generated = preprocess(&mut spec, &inputs()).unwrap();
        script_text(sandbox_exec(&generated[0].state)).to_string()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_generated_names_distinct_across_lookalike_sources() {
    let mut spec = load_from_str(LOOKALIKE_NAMES, SpecFormat::Yaml).unwrap();
    let generated = preprocess(&mut spec, &inputs()).unwrap();

    let names: Vec<_> = generated.iter().map(|p| p.patch_source.as_str()).collect();
    assert_eq!(
        names,
        vec!["__gomod_patch_app", "__gomod_patch_app#1", "__gomod_patch_app_1"]
    );
    assert_eq!(spec.patches["app"].len(), 2);
    assert_eq!(spec.patches["app_1"][0].source, "__gomod_patch_app_1");
    assert!(spec.validate().is_ok());
}

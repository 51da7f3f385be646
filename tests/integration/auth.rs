use super::{inputs, sandbox_exec, script_text};
use gomod_patcher::graph::{SecretEnv, SshSocket};
use gomod_patcher::preprocess::preprocess;
use gomod_patcher::spec::{load_from_str, SpecError, SpecFormat};

const PRIVATE_MODULES: &str = r#"
sources:
  app:
    context: {}
    generate:
      - gomod:
          edits:
            require:
              - "gitlab.internal/team/lib:gitlab.internal/team/lib@v0.9.1"
          auth:
            "gitlab.internal:8443":
              token: GL_TOKEN
            github.com:
              ssh:
                id: default
            bitbucket.example.com:
              header: BB_HEADER
            vcs.example.com:
              ssh:
                id: deploy
                username: builder
            plain.example.com: {}
"#;

#[test]
fn test_git_config_is_sorted_by_host() {
    let mut spec = load_from_str(PRIVATE_MODULES, SpecFormat::Yaml).unwrap();
    let generated = preprocess(&mut spec, &inputs()).unwrap();
    let script = script_text(sandbox_exec(&generated[0].state));

    let lines = [
        r#"git config --global credential."https://bitbucket.example.com".helper "/usr/local/bin/frontend credential-helper --kind=header""#,
        r#"git config --global url."ssh://git@github.com/".insteadOf "https://github.com/""#,
        r#"git config --global credential."https://gitlab.internal:8443".helper "/usr/local/bin/frontend credential-helper --kind=token""#,
        r#"git config --global url."ssh://builder@vcs.example.com/".insteadOf "https://vcs.example.com/""#,
    ];
    let positions: Vec<usize> = lines
        .iter()
        .map(|line| script.find(line).unwrap_or_else(|| panic!("missing {line}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert!(!script.contains("plain.example.com\".helper"));
    assert!(script.contains(
        r#"export GOPRIVATE="bitbucket.example.com,github.com,gitlab.internal,plain.example.com,vcs.example.com""#
    ));
    assert!(script.contains(
        r#"export GOINSECURE="bitbucket.example.com,github.com,gitlab.internal,plain.example.com,vcs.example.com""#
    ));
}

#[test]
fn test_credentials_stay_out_of_the_script() {
    let mut spec = load_from_str(PRIVATE_MODULES, SpecFormat::Yaml).unwrap();
    let generated = preprocess(&mut spec, &inputs()).unwrap();
    let exec = sandbox_exec(&generated[0].state);
    let script = script_text(exec);

    assert!(!script.contains("GL_TOKEN"));
    assert!(!script.contains("BB_HEADER"));

    assert_eq!(
        exec.run.secrets,
        vec![
            SecretEnv {
                id: "BB_HEADER".into(),
                env: "GOMOD_AUTH_HEADER_BITBUCKET_EXAMPLE_COM".into(),
            },
            SecretEnv {
                id: "GL_TOKEN".into(),
                env: "GOMOD_AUTH_TOKEN_GITLAB_INTERNAL_8443".into(),
            },
        ]
    );
    assert_eq!(
        exec.run.ssh,
        vec![
            SshSocket {
                id: "default".into(),
                target: "/run/buildkit/ssh_agent.0".into(),
            },
            SshSocket {
                id: "deploy".into(),
                target: "/run/buildkit/ssh_agent.1".into(),
            },
        ]
    );
    assert_eq!(
        exec.run.get_env("SSH_AUTH_SOCK"),
        Some("/run/buildkit/ssh_agent.0")
    );
}

#[test]
fn test_conflicting_mechanisms_are_rejected() {
    let input = r#"
sources:
  app:
    context: {}
    generate:
      - gomod:
          edits:
            require: ["a.io/m:a.io/m@v1.0.0"]
          auth:
            github.com:
              token: GH_TOKEN
              ssh:
                id: default
            "bad host": {}
"#;
    let err = load_from_str(input, SpecFormat::Yaml).unwrap_err();
    let SpecError::Validation { source, .. } = &err else {
        panic!("expected validation error, got {err}");
    };

    let locations: Vec<_> = source.issues.iter().map(|i| i.location.as_str()).collect();
    assert_eq!(
        locations,
        vec![
            "sources.app.generate[0].gomod.auth.bad host",
            "sources.app.generate[0].gomod.auth.github.com",
        ]
    );
    assert!(err.to_string().contains("only one of token, header, or ssh"));
}

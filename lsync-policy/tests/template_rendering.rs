use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use lsync_core::{config, EventKind, RootName};
use lsync_policy::{Policy, PolicyError, RootRef, TemplatePolicy};
use tempfile::TempDir;

const YAML: &str = r#"
roots:
  - name: site
    source: /var/www
    target: "mirror:/www/"
    startup: per_directory
    startup_action:
      binary: /usr/bin/env
      args: ["{{ event }}", "{{ root }}", "{{ source }}", "{{ directory }}", "{{ relative }}", "[{{ name }}]"]
    action:
      binary: "{% if event == 'delete' %}/bin/rm-remote{% else %}/usr/bin/rsync{% endif %}"
      args: ["{{ path }}", "{{ target }}{{ relative }}{{ name }}"]
      events: [close_write, delete]
"#;

fn load_policy(home: &Path) -> TemplatePolicy {
    let path = home.join("lsync.yaml");
    std::fs::write(&path, YAML).expect("write config");
    let config = config::load_at(&path).expect("load");
    config.validate().expect("valid");
    TemplatePolicy::new(&config).expect("compile")
}

fn site() -> RootName {
    RootName::from("site")
}

fn root(name: &RootName) -> RootRef<'_> {
    RootRef {
        name,
        source: Path::new("/var/www/"),
    }
}

#[test]
fn startup_exposes_every_variable() {
    let home = TempDir::new().expect("home");
    let policy = load_policy(home.path());
    let name = site();

    let action = policy
        .startup_action(root(&name), Path::new("/var/www/blog/2024/"))
        .expect("render")
        .expect("per_directory startup");
    assert_eq!(action.binary, PathBuf::from("/usr/bin/env"));
    assert_eq!(
        action.args,
        vec!["startup", "site", "/var/www/", "/var/www/blog/2024/", "blog/2024/", "[]"]
    );
}

#[test]
fn binary_template_can_branch_on_event() {
    let home = TempDir::new().expect("home");
    let policy = load_policy(home.path());
    let name = site();
    let dir = Path::new("/var/www/blog/");

    let write = policy
        .decide_action(root(&name), dir, EventKind::CloseWrite, Some(OsStr::new("a.html")))
        .expect("render")
        .expect("close_write");
    assert_eq!(write.binary, PathBuf::from("/usr/bin/rsync"));
    assert_eq!(write.args, vec!["/var/www/blog/a.html", "mirror:/www/blog/a.html"]);

    let delete = policy
        .decide_action(root(&name), dir, EventKind::Delete, Some(OsStr::new("a.html")))
        .expect("render")
        .expect("delete");
    assert_eq!(delete.binary, PathBuf::from("/bin/rm-remote"));
}

#[test]
fn filtered_kinds_decide_nothing() {
    let home = TempDir::new().expect("home");
    let policy = load_policy(home.path());
    let name = site();
    let decided = policy
        .decide_action(root(&name), Path::new("/var/www/"), EventKind::Attrib, Some(OsStr::new("x")))
        .expect("render");
    assert!(decided.is_none());
}

#[test]
fn binary_rendering_to_blank_is_rejected() {
    let home = TempDir::new().expect("home");
    let path = home.path().join("lsync.yaml");
    std::fs::write(
        &path,
        "roots:\n  - name: r\n    source: /r\n    target: t\n    action:\n      binary: \"{% if false %}x{% endif %}\"\n",
    )
    .expect("write");
    let config = config::load_at(&path).expect("load");
    let policy = TemplatePolicy::new(&config).expect("compile");
    let name = RootName::from("r");
    let err = policy
        .decide_action(
            RootRef {
                name: &name,
                source: Path::new("/r/"),
            },
            Path::new("/r/"),
            EventKind::Create,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, PolicyError::EmptyBinary { .. }), "got: {err}");
}

//! Container artifact checks: the Dockerfile at the repository root must
//! keep its working directory, layer order, port and launch commands.

use std::fs;
use std::path::PathBuf;

fn dockerfile() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Dockerfile");
    fs::read_to_string(&path).expect("read Dockerfile")
}

/// Active instructions as `(KEYWORD, arguments)`, continuation lines joined
fn instructions(content: &str) -> Vec<(String, String)> {
    let mut logical = Vec::new();
    let mut current = String::new();
    for line in content.lines().map(str::trim) {
        if current.is_empty() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        match line.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head.trim());
                current.push(' ');
            }
            None => {
                current.push_str(line);
                logical.push(std::mem::take(&mut current));
            }
        }
    }

    logical
        .into_iter()
        .filter_map(|line| {
            let (keyword, rest) = line.split_once(char::is_whitespace)?;
            Some((keyword.to_ascii_uppercase(), rest.trim().to_string()))
        })
        .collect()
}

fn exec_form(arguments: &str) -> Vec<String> {
    serde_json::from_str(arguments).expect("CMD uses exec form")
}

fn position(instructions: &[(String, String)], keyword: &str, needle: &str) -> usize {
    instructions
        .iter()
        .position(|(k, args)| k == keyword && args.contains(needle))
        .unwrap_or_else(|| panic!("no {keyword} containing {needle}"))
}

#[test]
fn test_working_directory_is_workspace() {
    let content = dockerfile();
    let workdirs: Vec<String> = instructions(&content)
        .into_iter()
        .filter(|(k, _)| k == "WORKDIR")
        .map(|(_, args)| args)
        .collect();
    assert!(!workdirs.is_empty());
    assert!(workdirs.iter().all(|dir| dir == "/workspace"), "{workdirs:?}");
}

#[test]
fn test_exposes_port_8080() {
    let content = dockerfile();
    let exposed: Vec<String> = instructions(&content)
        .into_iter()
        .filter(|(k, _)| k == "EXPOSE")
        .map(|(_, args)| args)
        .collect();
    assert_eq!(exposed, vec!["8080".to_string()]);
}

#[test]
fn test_dependencies_build_before_application_code() {
    let content = dockerfile();
    let steps = instructions(&content);

    let manifest = position(&steps, "COPY", "Cargo.toml");
    let dependency_build = steps
        .iter()
        .enumerate()
        .skip(manifest)
        .find(|(_, (k, args))| k == "RUN" && args.contains("cargo build"))
        .map(|(i, _)| i)
        .expect("dependency build step");
    let sources = position(&steps, "COPY", "src");

    assert!(manifest < dependency_build);
    assert!(dependency_build < sources);
}

#[test]
fn test_active_command_flags() {
    let content = dockerfile();
    let commands: Vec<String> = instructions(&content)
        .into_iter()
        .filter(|(k, _)| k == "CMD")
        .map(|(_, args)| args)
        .collect();
    assert_eq!(commands.len(), 1, "exactly one active CMD");
    assert_eq!(
        exec_form(&commands[0]),
        vec![
            "event-listener",
            "--processes=1",
            "--workers=4",
            "--log-level=DEBUG"
        ]
    );
}

#[test]
fn test_development_command_is_commented_out() {
    let content = dockerfile();
    let dev_command = content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('#'))
        .map(str::trim)
        .find_map(|line| line.strip_prefix("CMD"))
        .expect("commented development CMD");

    let args = exec_form(dev_command.trim());
    assert_eq!(args, vec!["event-listener", "--dev", "--log-level=DEBUG"]);
    assert!(!args.iter().any(|a| a.starts_with("--processes") || a.starts_with("--workers")));
}

#[test]
fn test_images_stay_on_bookworm() {
    let content = dockerfile();
    let images: Vec<String> = instructions(&content)
        .into_iter()
        .filter(|(k, _)| k == "FROM")
        .filter_map(|(_, args)| args.split_whitespace().next().map(str::to_string))
        .collect();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|image| image.contains("bookworm")), "{images:?}");
}

#[test]
fn test_copied_sources_exist() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let content = dockerfile();
    for (keyword, args) in instructions(&content) {
        if keyword != "COPY" || args.contains("--from=") {
            continue;
        }
        let tokens: Vec<&str> = args.split_whitespace().collect();
        for source in &tokens[..tokens.len() - 1] {
            // Optional glob sources such as the lockfile
            if source.contains('*') {
                continue;
            }
            assert!(root.join(source).exists(), "COPY source {source} is missing");
        }
    }
}

use std::path::{Path, PathBuf};

pub fn expand_tilde<P: AsRef<Path>>(path_user_input: P) -> Option<PathBuf> {
    let p = path_user_input.as_ref();
    if !p.starts_with("~") {
        return Some(p.to_path_buf());
    }
    if p == Path::new("~") {
        return dirs::home_dir();
    }
    let rest = p.strip_prefix("~").ok()?.to_path_buf();
    dirs::home_dir().map(|mut h| {
        if h == Path::new("/") {
            // Corner case: `h` root directory;
            // don't prepend extra `/`, just drop the tilde.
            rest
        } else {
            h.push(rest);
            h
        }
    })
}

#[test]
fn test_expand_tilde() {
    assert_eq!(
        expand_tilde("/etc/scene_query.json"),
        Some(PathBuf::from("/etc/scene_query.json"))
    );
    if let Some(home) = dirs::home_dir() {
        assert_eq!(expand_tilde("~"), Some(home.clone()));
        let expanded = expand_tilde("~/.scene_query/config.json").unwrap();
        assert!(expanded.ends_with(".scene_query/config.json"));
    }
}

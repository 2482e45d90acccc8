/// Returns `target` when it is a same-site absolute path, `fallback` otherwise.
///
/// Rejects protocol-relative (`//host`) and backslash tricks (`/\host`) as
/// well as anything carrying a scheme.
pub fn safe_redirect<'a>(target: Option<&'a str>, fallback: &'a str) -> &'a str {
    match target.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.contains("://") =>
        {
            path
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::safe_redirect;

    #[test]
    fn keeps_local_paths() {
        assert_eq!(
            safe_redirect(Some("/dashboard/profile?tab=1"), "/dashboard"),
            "/dashboard/profile?tab=1"
        );
    }

    #[test]
    fn rejects_offsite_targets() {
        for target in [
            "https://evil.example",
            "//evil.example",
            "/\\evil.example",
            "dashboard",
            "",
        ] {
            assert_eq!(safe_redirect(Some(target), "/dashboard"), "/dashboard", "{target}");
        }
        assert_eq!(safe_redirect(None, "/dashboard"), "/dashboard");
    }
}

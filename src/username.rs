// src/username.rs - Owner extraction from job file names

/// Marker separating the job name from the owner's username.
const USER_MARKER: &str = "_@";

/// Known job file extensions, longest first. Usernames may contain dots
/// (e.g. "riley.smith"), so stripping must only ever remove one of these,
/// and the compound ".gcode.3mf" must win over its ".3mf" suffix.
const KNOWN_EXTENSIONS: [&str; 5] = [".gcode.3mf", ".bgcode", ".gcode", ".gco", ".3mf"];

/// Extract a username from a job file name.
///
/// Looks for the last `_@` marker and strips exactly one known extension
/// from what follows (case-insensitive match, case-preserving result).
/// An unrecognized extension is left in place rather than guessed at.
pub fn extract_user(file_name: &str) -> Option<String> {
    let idx = file_name.rfind(USER_MARKER)?;
    let tail = &file_name[idx + USER_MARKER.len()..];
    if tail.is_empty() {
        return None;
    }

    let lower = tail.to_lowercase();
    for ext in KNOWN_EXTENSIONS {
        if lower.ends_with(ext) {
            return Some(tail[..tail.len() - ext.len()].to_string());
        }
    }
    Some(tail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_with_dots() {
        assert_eq!(
            extract_user("bracket_v3_@bob.smith.gcode"),
            Some("bob.smith".to_string())
        );
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(extract_user("part.3mf"), None);
        assert_eq!(extract_user("benchy@alice.gcode"), None);
    }

    #[test]
    fn test_longest_extension_wins() {
        assert_eq!(extract_user("x_@alice.gcode.3mf"), Some("alice".to_string()));
    }

    #[test]
    fn test_last_marker_used() {
        assert_eq!(
            extract_user("a_@b_@carol.bgcode"),
            Some("carol".to_string())
        );
    }

    #[test]
    fn test_extension_case_insensitive_result_preserved() {
        assert_eq!(extract_user("lid_@Dave.GCODE"), Some("Dave".to_string()));
    }

    #[test]
    fn test_unknown_extension_left_alone() {
        assert_eq!(extract_user("box_@erin.stl"), Some("erin.stl".to_string()));
    }

    #[test]
    fn test_empty_tail() {
        assert_eq!(extract_user("lonely_@"), None);
    }
}

use std::fmt;

use sha2::Digest;
use sha2::Sha256;

/// Fixed-size digest used to cheaply test pane content equality.
///
/// Collisions are treated as negligible for this workload; the digest is a
/// best-effort equality check, not a security boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight leading hex chars are plenty for log output.
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compare freshly captured text against the previous fingerprint.
///
/// The first capture for a pane (no prior fingerprint) is always a change.
/// Callers decide whether to commit the returned fingerprint.
pub fn detect_change(prev: Option<&Fingerprint>, text: &str) -> (bool, Fingerprint) {
    let next = Fingerprint::of(text);
    let changed = prev.is_none_or(|prev| *prev != next);
    (changed, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_is_unchanged() {
        let baseline = Fingerprint::of("line1\nline2");
        let (changed, next) = detect_change(Some(&baseline), "line1\nline2");
        assert!(!changed);
        assert_eq!(next, baseline);
    }

    #[test]
    fn different_text_is_changed() {
        let baseline = Fingerprint::of("line1\nline2");
        let (changed, next) = detect_change(Some(&baseline), "line1\nline2\nline3");
        assert!(changed);
        assert_ne!(next, baseline);
    }

    #[test]
    fn first_capture_is_always_changed() {
        let (changed, _) = detect_change(None, "anything");
        assert!(changed);

        let (changed, _) = detect_change(None, "");
        assert!(changed);
    }

    #[test]
    fn fingerprint_is_stable_across_calls() {
        assert_eq!(Fingerprint::of("same input"), Fingerprint::of("same input"));
    }
}

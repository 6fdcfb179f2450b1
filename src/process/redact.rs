//! Secret redaction for every line leaving the supervisor.

use std::borrow::Cow;
use std::sync::Arc;

/// Replacement written in place of the secret.
pub const REDACTED: &str = "********";

/// Replaces literal occurrences of one secret.
#[derive(Clone, Debug, Default)]
pub struct Redactor {
    secret: Option<Arc<str>>,
}

impl Redactor {
    /// An empty secret disables redaction.
    pub fn new(secret: &str) -> Self {
        Self {
            secret: (!secret.is_empty()).then(|| Arc::from(secret)),
        }
    }

    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match &self.secret {
            Some(s) if text.contains(s.as_ref()) => Cow::Owned(text.replace(s.as_ref(), REDACTED)),
            _ => Cow::Borrowed(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_occurrence() {
        let r = Redactor::new("hunter2");
        assert_eq!(
            r.redact("-pwd hunter2 -user x -again hunter2"),
            format!("-pwd {REDACTED} -user x -again {REDACTED}")
        );
    }

    #[test]
    fn untouched_text_is_borrowed() {
        let r = Redactor::new("hunter2");
        assert!(matches!(r.redact("nothing here"), Cow::Borrowed(_)));
    }

    #[test]
    fn empty_secret_disables_redaction() {
        let r = Redactor::new("");
        assert_eq!(r.redact("abc"), "abc");
    }
}

use super::{HeaderProvider, Headers};

pub mod directive {
    pub const BASE_URI: &str = "base-uri";
    pub const CONNECTIONS: &str = "connect-src";
    pub const CHILD_IFRAME: &str = "child-src";
    pub const SCRIPTS: &str = "script-src";
    pub const STYLE: &str = "style-src";
    pub const IMAGES: &str = "img-src";
    pub const FORMS_ACTION: &str = "form-action";
    pub const ANCESTOR_IFRAME: &str = "frame-ancestors";
    pub const FONTS: &str = "font-src";
    pub const OBJECTS: &str = "object-src";
    pub const MEDIA: &str = "media-src";
}

pub mod source {
    pub const ANY: &str = "*";
    pub const SELF: &str = "'self'";
    pub const NONE: &str = "'none'";
}

/// `Content-Security-Policy` allow-lists, one per directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Csp {
    rules: Vec<(String, Vec<String>)>,
}

impl Csp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `target` to the directive's allow-list. The keywords `*`,
    /// `'self'` and `'none'` replace the list instead.
    pub fn allow(mut self, directive: &str, target: &str) -> Self {
        let exclusive = matches!(target, source::ANY | source::SELF | source::NONE);
        let list = self.list_mut(directive);
        if exclusive {
            list.clear();
        }
        list.push(target.to_string());
        self
    }

    pub fn remove(mut self, directive: &str, target: &str) -> Self {
        if let Some((_, list)) = self.rules.iter_mut().find(|(d, _)| d == directive) {
            if let Some(pos) = list.iter().position(|t| t == target) {
                list.remove(pos);
            }
        }
        self
    }

    fn list_mut(&mut self, directive: &str) -> &mut Vec<String> {
        let pos = match self.rules.iter().position(|(d, _)| d == directive) {
            Some(pos) => pos,
            None => {
                self.rules.push((directive.to_string(), Vec::new()));
                self.rules.len() - 1
            }
        };
        &mut self.rules[pos].1
    }
}

impl HeaderProvider for Csp {
    fn headers(&self) -> Headers {
        let policy = self
            .rules
            .iter()
            .map(|(directive, list)| format!("{directive} {}", list.join(" ")))
            .collect::<Vec<_>>();

        if policy.is_empty() {
            return Headers::new();
        }
        Headers::from([(
            "Content-Security-Policy".to_string(),
            policy.join(", "),
        )])
    }
}

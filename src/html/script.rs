use std::borrow::Cow;

/// Client-side script content before injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Injected as-is.
    Literal(Cow<'static, str>),
    /// `$KEY` placeholders in `body` are replaced by the matching params.
    Template {
        body: Cow<'static, str>,
        params: Vec<(String, String)>,
    },
}

impl Script {
    pub fn literal(body: impl Into<Cow<'static, str>>) -> Self {
        Script::Literal(body.into())
    }

    pub fn template(body: impl Into<Cow<'static, str>>) -> Self {
        Script::Template {
            body: body.into(),
            params: Vec::new(),
        }
    }

    /// Add a placeholder value. No-op on literals.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Script::Template { params, .. } = &mut self {
            params.push((key.into(), value.to_string()));
        }
        self
    }

    /// Resolve placeholders into final text.
    pub fn render(&self) -> String {
        match self {
            Script::Literal(body) => body.to_string(),
            Script::Template { body, params } => {
                // Longest keys first so `$KEY_LONG` is not clobbered by `$KEY`.
                let mut ordered: Vec<&(String, String)> = params.iter().collect();
                ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

                let mut text = body.to_string();
                for (key, value) in ordered {
                    text = text.replace(&format!("${key}"), value);
                }
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_replaces_every_occurrence() {
        let script = Script::template("const a = \"$RAY_ID\"; const b = \"$RAY_ID\"; $RETRY;")
            .param("RAY_ID", "abc")
            .param("RETRY", 3);
        assert_eq!(script.render(), "const a = \"abc\"; const b = \"abc\"; 3;");
    }

    #[test]
    fn overlapping_keys_resolve_to_the_longest() {
        let script = Script::template("$ARKOSE_JS $ARKOSE_JS_ENDPOINT")
            .param("ARKOSE_JS", "short")
            .param("ARKOSE_JS_ENDPOINT", "long");
        assert_eq!(script.render(), "short long");
    }

    #[test]
    fn literal_ignores_params() {
        let script = Script::literal("console.log('$X')").param("X", "y");
        assert_eq!(script.render(), "console.log('$X')");
    }
}

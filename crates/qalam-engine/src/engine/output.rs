// crates/qalam-engine/src/engine/output.rs

use std::rc::Rc;

use crate::scope::Scope;

/// Accumulates expanded text. With markers enabled, a `#line` marker is
/// emitted whenever output switches to a different source file, so
/// downstream tools can map lines back. Inline captures never mark.
#[derive(Debug)]
pub(crate) struct OutputBuffer {
    chunks: Vec<String>,
    last_path: Option<Rc<str>>,
    markers: bool,
}

impl OutputBuffer {
    pub fn new(markers: bool) -> Self {
        OutputBuffer {
            chunks: Vec::new(),
            last_path: None,
            markers,
        }
    }

    pub fn emit(&mut self, scope: &Scope, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.markers && !scope.is_inline() && self.last_path.as_deref() != Some(scope.path()) {
            self.chunks
                .push(format!("#line {} \"{}\"\n", scope.line(), scope.path()));
            self.last_path = Some(Rc::from(scope.path()));
        }
        self.chunks.push(text.to_string());
    }

    pub fn finish(self) -> String {
        self.chunks.concat()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_plain_buffer_concatenates() {
        let scope = Scope::new("main", "main.txt");
        let mut buf = OutputBuffer::new(false);
        buf.emit(&scope.at_line(1), "one\n");
        buf.emit(&scope.at_line(2), "");
        buf.emit(&scope.at_line(3), "two\n");
        assert_eq!(buf.finish(), "one\ntwo\n");
    }

    #[test]
    fn test_markers_fire_on_file_switch() {
        let outer = Scope::new("main", "main.txt");
        let inner = Scope::new("part", "lib/part.txt");
        let mut buf = OutputBuffer::new(true);
        buf.emit(&outer.at_line(1), "a\n");
        buf.emit(&inner.at_line(1), "b\n");
        buf.emit(&inner.at_line(2), "c\n");
        buf.emit(&outer.at_line(2), "d\n");
        assert_eq!(
            buf.finish(),
            "#line 1 \"main.txt\"\na\n#line 1 \"lib/part.txt\"\nb\nc\n#line 2 \"main.txt\"\nd\n"
        );
    }

    #[test]
    fn test_inline_scopes_never_mark() {
        let scope = Scope::new("main", "main.txt").as_inline();
        let mut buf = OutputBuffer::new(true);
        buf.emit(&scope.at_line(1), "x");
        assert_eq!(buf.finish(), "x");
    }
}

use std::error;
use std::fmt;

/// A diagnostic produced by one of the compiler passes. `K` is the
/// pass-specific error kind; everything else (location, snippet, context
/// notes) is shared plumbing.
#[derive(Debug, Clone)]
pub struct Error<K> {
    pub kind: K,
    file: Option<std::path::PathBuf>,
    snippet: Option<Snippet>,
    contexts: Vec<&'static str>,
}

/// A byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub const fn new(offset: usize) -> Self {
        Self { offset, len: 1 }
    }

    pub const fn with_len(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// The span covering both `self` and `other` (`other` must not start
    /// before `self`).
    pub fn until(self, other: Span) -> Span {
        Span {
            offset: self.offset,
            len: (other.offset + other.len).saturating_sub(self.offset),
        }
    }

    fn snippet_from_source(&self, source: &SourceMetadata) -> Option<Snippet> {
        let mut offset = 0;
        for (i, line) in source.input().split('\n').enumerate() {
            let next_offset = offset + line.len() + 1;
            if next_offset > self.offset {
                return Some(Snippet {
                    position: Position {
                        line: i + 1,
                        col: self.offset - offset + 1,
                    },
                    line: line.to_string(),
                });
            }
            offset = next_offset;
        }
        None
    }
}

/// The source text plus the (optional) file it came from. Shared by every
/// pass so diagnostics can render the offending line.
#[derive(Debug)]
pub struct SourceMetadata<'a> {
    file: Option<std::path::PathBuf>,
    source: &'a str,
}

impl<'a> SourceMetadata<'a> {
    pub const fn new(source: &'a str) -> Self {
        Self { file: None, source }
    }

    #[must_use]
    pub fn with_file(mut self, file: std::path::PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    pub const fn input(&self) -> &'a str {
        self.source
    }
}

impl<K> Error<K> {
    pub const fn new(kind: K) -> Self {
        Self {
            kind,
            file: None,
            snippet: None,
            contexts: Vec::new(),
        }
    }

    pub fn map_kind<F, U>(self, mapper: F) -> Error<U>
    where
        F: FnOnce(K) -> U,
    {
        Error {
            kind: mapper(self.kind),
            file: self.file,
            snippet: self.snippet,
            contexts: self.contexts,
        }
    }

    #[must_use]
    pub fn with_source(mut self, span: Span, source: &SourceMetadata) -> Self {
        self.file = source.file.clone();
        self.snippet = span.snippet_from_source(source);
        self
    }

    #[must_use]
    pub fn add_context(mut self, ctx: &'static str) -> Self {
        self.contexts.push(ctx);
        self
    }

    /// The 1-indexed position the diagnostic points at, when known.
    pub fn position(&self) -> Option<Position> {
        self.snippet.as_ref().map(|s| s.position)
    }
}

#[derive(Debug, Clone)]
struct Snippet {
    position: Position,
    line: String,
}

/// 1-indexed line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

/// What a pass wanted to see when it errored: either a specific item or a
/// free-form description of the construct being parsed.
#[derive(Debug, Clone)]
pub enum WantedSpec<T> {
    Specific(T),
    Description(&'static str),
}

impl<T: fmt::Display> fmt::Display for WantedSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Specific(t) => write!(f, "{}", t),
            Self::Description(desc) => f.write_str(desc),
        }
    }
}

impl<K: error::Error + 'static> error::Error for Error<K> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl<K: fmt::Display> fmt::Display for Error<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let whiles = self
            .contexts
            .iter()
            .copied()
            .fold(String::new(), |acc, next| acc + "\nwhile " + next);
        let snippet = match &self.snippet {
            Some(snip) => snip,
            None => return write!(f, "{} (no location info){}", self.kind, whiles),
        };
        let file = self
            .file
            .as_ref()
            .and_then(|x| x.to_str())
            .unwrap_or("<input>");
        write!(
            f,
            "\
{kind}
   --> {file}:{line}:{col}
    |
{line:3} | {snippet}
    | {marker:>width$}{whiles}",
            width = snippet.position.col,
            marker = '^',
            line = snippet.position.line,
            col = snippet.position.col,
            file = file,
            kind = self.kind,
            snippet = snippet.line,
            whiles = whiles,
        )
    }
}

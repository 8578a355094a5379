/// A document split into lines with their original terminators, so that
/// edits touch only the replaced line and everything else round-trips
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DocumentLines {
    lines: Vec<(String, &'static str)>,
}

impl DocumentLines {
    pub(crate) fn parse(text: &str) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|piece| {
                if let Some(body) = piece.strip_suffix("\r\n") {
                    (body.to_string(), "\r\n")
                } else if let Some(body) = piece.strip_suffix('\n') {
                    (body.to_string(), "\n")
                } else {
                    (piece.to_string(), "")
                }
            })
            .collect();
        Self { lines }
    }

    /// Line content without terminator, 1-based.
    pub(crate) fn get(&self, line: usize) -> Option<&str> {
        let index = line.checked_sub(1)?;
        self.lines.get(index).map(|(body, _)| body.as_str())
    }

    pub(crate) fn set(&mut self, line: usize, body: String) -> bool {
        match line.checked_sub(1).and_then(|index| self.lines.get_mut(index)) {
            Some(entry) => {
                entry.0 = body;
                true
            }
            None => false,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(index, (body, _))| (index + 1, body.as_str()))
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for (body, terminator) in &self.lines {
            out.push_str(body);
            out.push_str(terminator);
        }
        out
    }
}
